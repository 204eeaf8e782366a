//! FnHandler - a native closure as a handler. No exclusive section.

use async_trait::async_trait;

use crate::domain::{CallArguments, CallResult, Status};
use crate::ports::Handler;

pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&str, CallArguments) -> Result<CallResult, Status> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&str, CallArguments) -> Result<CallResult, Status> + Send + Sync,
{
    async fn call(&self, endpoint: &str, args: CallArguments) -> Result<CallResult, Status> {
        (self.f)(endpoint, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Payload, SerializedObject, StatusCode};

    #[tokio::test]
    async fn closure_sees_endpoint_and_args() {
        let count = FnHandler::new(|endpoint: &str, args: CallArguments| {
            if endpoint != "count" {
                return Err(Status::not_found(endpoint));
            }
            let n = SerializedObject::Int(args.args.len() as i64);
            Ok(CallResult::new(Payload::from_object(&n)?))
        });

        let args = CallArguments::new().with_arg(Payload::Object { data: vec![] });
        let result = count.call("count", args).await.unwrap();
        assert_eq!(result.result.to_object().unwrap(), SerializedObject::Int(1));

        let status = count.call("other", CallArguments::new()).await.unwrap_err();
        assert_eq!(status.code, StatusCode::NotFound);
    }
}
