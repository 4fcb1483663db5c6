use super::message::{Message, MessageShape};
use super::type_name::{Category, TypeName};
use crate::{Error, Result};

/// A request/response service type.
///
/// The associated types are the only values a client may send and a
/// handler may return. `descriptor()` describes the pair explicitly and is
/// validated once when a client or server is constructed.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use svcbus::schema::{Message, Service};
///
/// #[derive(Serialize, Deserialize)]
/// struct TriggerRequest {}
///
/// #[derive(Serialize, Deserialize)]
/// struct TriggerResponse { success: bool, message: String }
///
/// impl Message for TriggerRequest {
///     const TYPE_NAME: &'static str = "demo/srvs/std/Trigger.Request";
/// }
/// impl Message for TriggerResponse {
///     const TYPE_NAME: &'static str = "demo/srvs/std/Trigger.Response";
/// }
///
/// struct Trigger;
/// impl Service for Trigger {
///     type Request = TriggerRequest;
///     type Response = TriggerResponse;
///     const TYPE_NAME: &'static str = "demo/srvs/std/Trigger";
/// }
///
/// assert!(Trigger::descriptor().validate_for::<Trigger>().is_ok());
/// ```
pub trait Service: Send + Sync + 'static {
    type Request: Message;
    type Response: Message;

    const TYPE_NAME: &'static str;

    fn descriptor() -> ServiceDescriptor {
        ServiceDescriptor::new(Self::TYPE_NAME)
            .with_request::<Self::Request>()
            .with_response::<Self::Response>()
    }
}

/// Explicit description of a service's nested shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    name: &'static str,
    request: Option<MessageShape>,
    response: Option<MessageShape>,
}

impl ServiceDescriptor {
    /// A descriptor with neither shape declared.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            request: None,
            response: None,
        }
    }

    pub fn with_request<M: Message>(self) -> Self {
        self.with_request_shape(MessageShape::of::<M>())
    }

    pub fn with_response<M: Message>(self) -> Self {
        self.with_response_shape(MessageShape::of::<M>())
    }

    pub fn with_request_shape(mut self, shape: MessageShape) -> Self {
        self.request = Some(shape);
        self
    }

    pub fn with_response_shape(mut self, shape: MessageShape) -> Self {
        self.response = Some(shape);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn request(&self) -> Option<MessageShape> {
        self.request
    }

    pub fn response(&self) -> Option<MessageShape> {
        self.response
    }

    /// Check this descriptor against the static types of `S`.
    ///
    /// # Errors
    ///
    /// `Error::Schema` if the name is not a top-level `srvs` identifier,
    /// if it differs from `S::TYPE_NAME`, or if either nested shape is
    /// missing, misnamed, or different from `S::Request` / `S::Response`.
    pub fn validate_for<S: Service>(&self) -> Result<()> {
        // ---
        TypeName::parse(self.name)
            .map_err(|err| Error::Schema(err.to_string()))?
            .expect_top_level(Category::Srvs)?;

        if self.name != S::TYPE_NAME {
            return Err(Error::Schema(format!(
                "descriptor '{}' does not describe service '{}'",
                self.name,
                S::TYPE_NAME
            )));
        }

        self.check_shape("Request", self.request, MessageShape::of::<S::Request>())?;
        self.check_shape("Response", self.response, MessageShape::of::<S::Response>())
    }

    fn check_shape(
        &self,
        nested: &str,
        declared: Option<MessageShape>,
        actual: MessageShape,
    ) -> Result<()> {
        // ---
        let Some(declared) = declared else {
            return Err(Error::Schema(format!(
                "service '{}' must declare a '{nested}' shape",
                self.name
            )));
        };

        let required = format!("{}.{nested}", self.name);
        if declared.type_name() != required {
            return Err(Error::Schema(format!(
                "service '{}' {nested} shape is named '{}', expected '{required}'",
                self.name,
                declared.type_name()
            )));
        }

        if declared != actual {
            return Err(Error::Schema(format!(
                "service '{}' {nested} shape '{}' does not match type '{}'",
                self.name,
                declared.type_name(),
                actual.type_name()
            )));
        }
        Ok(())
    }
}
