use serde::{Deserialize, Serialize};

use svcbus::schema::{Message, Service};

/// Request to add two numbers.
#[derive(Debug, Serialize, Deserialize)]
pub struct AddTwoIntsRequest {
    pub a: i64,
    pub b: i64,
}

/// Response containing the sum.
#[derive(Debug, Serialize, Deserialize)]
pub struct AddTwoIntsResponse {
    pub sum: i64,
}

impl Message for AddTwoIntsRequest {
    const TYPE_NAME: &'static str = "demo/srvs/examples/AddTwoInts.Request";
}

impl Message for AddTwoIntsResponse {
    const TYPE_NAME: &'static str = "demo/srvs/examples/AddTwoInts.Response";
}

pub struct AddTwoInts;

impl Service for AddTwoInts {
    type Request = AddTwoIntsRequest;
    type Response = AddTwoIntsResponse;
    const TYPE_NAME: &'static str = "demo/srvs/examples/AddTwoInts";
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EchoRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EchoResponse {
    pub text: String,
}

impl Message for EchoRequest {
    const TYPE_NAME: &'static str = "demo/srvs/examples/Echo.Request";
}

impl Message for EchoResponse {
    const TYPE_NAME: &'static str = "demo/srvs/examples/Echo.Response";
}

pub struct Echo;

impl Service for Echo {
    type Request = EchoRequest;
    type Response = EchoResponse;
    const TYPE_NAME: &'static str = "demo/srvs/examples/Echo";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub yaw: f64,
}

impl Message for Pose {
    const TYPE_NAME: &'static str = "demo/msgs/geometry/Pose";
}
