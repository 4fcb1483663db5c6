use serde::de::DeserializeOwned;
use serde::Serialize;

use super::type_name::{Category, TypeName};
use crate::Result;

/// A typed message that can travel over a transport.
///
/// `TYPE_NAME` is written into every encoded frame and checked on decode.
/// Plain pub/sub messages use a `msgs` identifier; service request and
/// response shapes use `<service>.Request` / `<service>.Response`.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use svcbus::schema::Message;
///
/// #[derive(Serialize, Deserialize)]
/// struct Point { x: f64, y: f64 }
///
/// impl Message for Point {
///     const TYPE_NAME: &'static str = "demo/msgs/geometry/Point";
/// }
/// ```
pub trait Message: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE_NAME: &'static str;
}

/// Runtime description of the shape a decoder expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageShape {
    type_name: &'static str,
}

impl MessageShape {
    /// The shape of message type `M`.
    pub fn of<M: Message>() -> Self {
        Self {
            type_name: M::TYPE_NAME,
        }
    }

    /// A shape known only by name.
    pub const fn named(type_name: &'static str) -> Self {
        Self { type_name }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check that this shape names a top-level `msgs` type.
    ///
    /// Publishers and subscribers call this once at construction.
    pub fn validate_topic_message(&self) -> Result<()> {
        // ---
        TypeName::parse(self.type_name)?.expect_top_level(Category::Msgs)
    }
}
