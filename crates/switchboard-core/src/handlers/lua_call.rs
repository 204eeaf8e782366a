//! LuaCallHandler - runs a call against a function in the hosted runtime.
//!
//! # Call flow
//! 1. reject duplicate keyword arguments
//! 2. build the `TensorLookup` (no VM access)
//! 3. on the blocking pool: enter the exclusive section, decode arguments,
//!    invoke, encode the returned values, leave the section
//! 4. finish the wire encoding (no VM access)

use std::sync::Arc;

use async_trait::async_trait;

use crate::codec::TensorLookup;
use crate::domain::{CallArguments, CallResult, Status};
use crate::ports::{Handler, LittleEndianDecoder, TensorDecoder};
use crate::runtime::{Callable, HostedRuntime, RuntimeError};

pub struct LuaCallHandler {
    callable: Arc<Callable>,
    decoder: Arc<dyn TensorDecoder>,
}

impl LuaCallHandler {
    pub fn new(callable: Callable) -> Self {
        Self {
            callable: Arc::new(callable),
            decoder: Arc::new(LittleEndianDecoder),
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn TensorDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Handler for the function produced by evaluating `source`.
    pub fn from_source(runtime: &Arc<HostedRuntime>, source: &str) -> Result<Self, RuntimeError> {
        Ok(Self::new(runtime.compile(source)?))
    }

    /// One handler per function exported by a script, sorted by name.
    pub fn from_script(
        runtime: &Arc<HostedRuntime>,
        source: &str,
        chunk_name: &str,
    ) -> Result<Vec<(String, Self)>, RuntimeError> {
        Ok(runtime
            .load_script(source, chunk_name)?
            .into_iter()
            .map(|(name, callable)| (name, Self::new(callable)))
            .collect())
    }
}

#[async_trait]
impl Handler for LuaCallHandler {
    async fn call(&self, endpoint: &str, args: CallArguments) -> Result<CallResult, Status> {
        args.check_unique_kwargs()?;
        let lookup = TensorLookup::build(&args, self.decoder.as_ref())?;

        let callable = Arc::clone(&self.callable);
        let returned = tokio::task::spawn_blocking(move || callable.invoke(&args, &lookup))
            .await
            .map_err(|err| {
                Status::internal(format!("call to '{endpoint}' did not complete: {err}"))
            })??;

        Ok(CallResult::new(returned.into_payload()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::domain::{
        CodecError, DType, Payload, SerializedObject, StatusCode, Tensor, TensorPayload,
    };
    use crate::error_map::MISSING_TEXT_MESSAGE;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn int(value: i64) -> Payload {
        Payload::from_object(&SerializedObject::Int(value)).unwrap()
    }

    fn object(result: CallResult) -> SerializedObject {
        result.result.to_object().unwrap()
    }

    fn handler(source: &str) -> LuaCallHandler {
        LuaCallHandler::from_source(&HostedRuntime::new().unwrap(), source).unwrap()
    }

    fn shared_tensor() -> Payload {
        Payload::Tensor(TensorPayload {
            dtype: DType::Int32,
            shape: vec![3],
            data: [1i32, 2, 3].iter().flat_map(|v| v.to_le_bytes()).collect(),
            reference: Some(0),
        })
    }

    #[derive(Default)]
    struct CountingDecoder {
        decodes: AtomicUsize,
    }

    impl TensorDecoder for CountingDecoder {
        fn decode(&self, payload: &TensorPayload) -> Result<Tensor, CodecError> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            LittleEndianDecoder.decode(payload)
        }
    }

    #[tokio::test]
    async fn adds_two_numbers() {
        let add = handler("return function(a, b) return a + b end");
        let args = CallArguments::new().with_arg(int(1)).with_arg(int(2));
        let result = add.call("add", args).await.unwrap();
        assert_eq!(object(result), SerializedObject::Int(3));
    }

    #[tokio::test]
    async fn lookup_failure_is_not_found() {
        let fail = handler(r#"return function() rpc.raise("key", "key missing") end"#);
        let status = fail.call("fail", CallArguments::new()).await.unwrap_err();
        assert_eq!(status.code, StatusCode::NotFound);
        assert!(status.message.contains("key missing"));
        assert!(status.message.starts_with("callable raised an error on the server:\n"));
    }

    #[rstest]
    #[case::value(r#"rpc.raise("value", "bad")"#, StatusCode::InvalidArgument)]
    #[case::type_error("return nil + 1", StatusCode::InvalidArgument)]
    #[case::exhausted(r#"rpc.raise("exhausted", "done")"#, StatusCode::OutOfRange)]
    #[case::memory(r#"rpc.raise("memory", "full")"#, StatusCode::ResourceExhausted)]
    #[case::unimplemented(r#"rpc.raise("unimplemented", "later")"#, StatusCode::Unimplemented)]
    #[case::interrupted(r#"rpc.raise("interrupted", "stop")"#, StatusCode::Aborted)]
    #[case::internal(r#"rpc.raise("internal", "broken")"#, StatusCode::Internal)]
    #[case::index(r#"rpc.raise("index", "out of range")"#, StatusCode::NotFound)]
    #[case::plain_error(r#"error("boom")"#, StatusCode::Unknown)]
    #[case::custom(r#"rpc.raise("teapot", "short and stout")"#, StatusCode::Unknown)]
    #[case::ordered(r#"rpc.raise({"lookup", "value"}, "both")"#, StatusCode::InvalidArgument)]
    #[tokio::test]
    async fn failures_map_to_status_codes(#[case] body: &str, #[case] expected: StatusCode) {
        let callable = handler(&format!("return function() {body} end"));
        let status = callable.call("f", CallArguments::new()).await.unwrap_err();
        assert_eq!(status.code, expected);
    }

    #[tokio::test]
    async fn empty_failure_text_falls_back_to_internal() {
        let silent = handler(r#"return function() error("", 0) end"#);
        let status = silent.call("silent", CallArguments::new()).await.unwrap_err();
        assert_eq!(status.code, StatusCode::Internal);
        assert_eq!(status.message, MISSING_TEXT_MESSAGE);
    }

    #[rstest]
    #[case::trailing_none(SerializedObject::List(vec![
        SerializedObject::Int(1),
        SerializedObject::None,
    ]))]
    #[case::leading_none(SerializedObject::List(vec![
        SerializedObject::None,
        SerializedObject::Int(1),
    ]))]
    #[case::bytes(SerializedObject::Bytes(b"abc".to_vec()))]
    #[case::none_dict_value(SerializedObject::dict([(
        SerializedObject::String("missing".into()),
        SerializedObject::None,
    )]))]
    #[case::nested(SerializedObject::List(vec![
        SerializedObject::List(vec![SerializedObject::None]),
        SerializedObject::String("x".into()),
        SerializedObject::Double(0.5),
    ]))]
    #[case::bare_none(SerializedObject::None)]
    #[tokio::test]
    async fn objects_pass_through_unchanged(#[case] value: SerializedObject) {
        let echo = handler("return function(x) return x end");
        let args = CallArguments::new().with_arg(Payload::from_object(&value).unwrap());
        let result = echo.call("echo", args).await.unwrap();
        assert_eq!(object(result), value);
    }

    #[tokio::test]
    async fn none_items_are_visible_to_scripts() {
        let check = handler(
            "return function(xs, kw) return xs[1] == rpc.none, #xs, kw.flag == rpc.none end",
        );
        let none_list = SerializedObject::List(vec![SerializedObject::None]);
        let args = CallArguments::new()
            .with_arg(Payload::from_object(&none_list).unwrap())
            .with_kwarg("flag", Payload::from_object(&SerializedObject::None).unwrap());
        let result = check.call("check", args).await.unwrap();
        assert_eq!(
            object(result),
            SerializedObject::List(vec![
                SerializedObject::Bool(true),
                SerializedObject::Int(1),
                SerializedObject::Bool(true),
            ])
        );
    }

    #[tokio::test]
    async fn shared_tensors_are_decoded_once_and_identical() {
        let decoder = Arc::new(CountingDecoder::default());
        let same = handler("return function(a, b) return rawequal(a, b) end")
            .with_decoder(decoder.clone());
        let args = CallArguments::new()
            .with_arg(shared_tensor())
            .with_arg(shared_tensor());

        let result = same.call("same", args).await.unwrap();
        assert_eq!(object(result), SerializedObject::Bool(true));
        assert_eq!(decoder.decodes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn returned_tensor_is_a_tensor_payload() {
        let identity = handler("return function(t) return t end");
        let args = CallArguments::new().with_arg(shared_tensor());
        let result = identity.call("identity", args).await.unwrap();
        let Payload::Tensor(tensor) = result.result else {
            panic!("expected a tensor payload");
        };
        assert_eq!(tensor.shape, vec![3]);
        assert_eq!(tensor.reference, None);
    }

    #[tokio::test]
    async fn scripts_can_build_tensors() {
        let make = handler(r#"return function() return rpc.tensor("uint8", {2}, {7, 9}) end"#);
        let result = make.call("make", CallArguments::new()).await.unwrap();
        assert_eq!(
            result.result,
            Payload::Tensor(TensorPayload {
                dtype: DType::Uint8,
                shape: vec![2],
                data: vec![7, 9],
                reference: None,
            })
        );
    }

    #[tokio::test]
    async fn kwargs_arrive_as_trailing_table() {
        let scale = handler("return function(x, kw) return x * kw.by, kw.by end");
        let args = CallArguments::new()
            .with_arg(int(5))
            .with_kwarg("by", int(3));
        let result = scale.call("scale", args).await.unwrap();
        assert_eq!(
            object(result),
            SerializedObject::List(vec![SerializedObject::Int(15), SerializedObject::Int(3)])
        );
    }

    #[tokio::test]
    async fn duplicate_kwargs_are_rejected() {
        let echo = handler("return function() end");
        let args = CallArguments::new()
            .with_kwarg("x", int(1))
            .with_kwarg("x", int(2));
        let status = echo.call("echo", args).await.unwrap_err();
        assert_eq!(status.code, StatusCode::InvalidArgument);
    }

    #[tokio::test]
    async fn corrupt_object_is_internal() {
        let echo = handler("return function(x) return x end");
        let args = CallArguments::new().with_arg(Payload::Object {
            data: b"not an object".to_vec(),
        });
        let status = echo.call("echo", args).await.unwrap_err();
        assert_eq!(status.code, StatusCode::Internal);
    }

    #[tokio::test]
    async fn unserializable_return_is_invalid_argument() {
        let leak = handler("return function() return function() end end");
        let status = leak.call("leak", CallArguments::new()).await.unwrap_err();
        assert_eq!(status.code, StatusCode::InvalidArgument);
        assert!(status.message.contains("function"));
    }

    #[test]
    fn syntax_errors_surface_as_internal() {
        let runtime = HostedRuntime::new().unwrap();
        let err = LuaCallHandler::from_source(&runtime, "return function(").err().unwrap();
        let status = Status::from(err);
        assert_eq!(status.code, StatusCode::Internal);
        assert!(status.message.starts_with("script failed to load:\n"));
    }

    #[tokio::test]
    async fn bare_error_falls_back_to_internal() {
        let silent = handler("return function() error() end");
        let status = silent.call("silent", CallArguments::new()).await.unwrap_err();
        assert_eq!(status.code, StatusCode::Internal);
        assert_eq!(status.message, MISSING_TEXT_MESSAGE);
    }

    #[tokio::test]
    async fn failure_text_has_no_traceback() {
        let fail = handler(r#"return function() error("boom", 0) end"#);
        let status = fail.call("fail", CallArguments::new()).await.unwrap_err();
        assert_eq!(status.message, "callable raised an error on the server:\nboom");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn call_waits_for_the_exclusive_section() {
        let runtime = HostedRuntime::new().unwrap();
        let add = Arc::new(
            LuaCallHandler::from_source(&runtime, "return function(a, b) return a + b end")
                .unwrap(),
        );

        let section = runtime.enter();
        let call = tokio::spawn({
            let add = Arc::clone(&add);
            async move {
                let args = CallArguments::new().with_arg(int(1)).with_arg(int(2));
                add.call("add", args).await
            }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!call.is_finished());

        drop(section);
        let result = tokio::time::timeout(Duration::from_secs(5), call)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(object(result), SerializedObject::Int(3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn interrupt_aborts_the_running_callable() {
        let runtime = HostedRuntime::new().unwrap();
        let spin = Arc::new(
            LuaCallHandler::from_source(&runtime, "return function() while true do end end")
                .unwrap(),
        );

        let call = tokio::spawn({
            let spin = Arc::clone(&spin);
            async move { spin.call("spin", CallArguments::new()).await }
        });
        while !call.is_finished() {
            runtime.interrupt();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let status = call.await.unwrap().unwrap_err();
        assert_eq!(status.code, StatusCode::Aborted);
    }

    #[tokio::test]
    async fn memory_exhaustion_is_resource_exhausted() {
        let config = RuntimeConfig {
            memory_limit_bytes: Some(8 * 1024 * 1024),
            ..RuntimeConfig::default()
        };
        let runtime = HostedRuntime::with_config(&config).unwrap();
        let hog = LuaCallHandler::from_source(
            &runtime,
            "return function() local t = {} for i = 1, 1e8 do t[i] = i end end",
        )
        .unwrap();

        let status = hog.call("hog", CallArguments::new()).await.unwrap_err();
        assert_eq!(status.code, StatusCode::ResourceExhausted);
    }
}
