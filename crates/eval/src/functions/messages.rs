//! Message functions. Every function taking an optional `message`
//! argument acts on the current message when it is omitted.

use std::sync::Arc;

use conduit_core::{Value, ValueType};
use conduit_storage::DEFAULT_STREAM_ID;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use crate::context::EvaluationContext;
use crate::error::EvalError;
use crate::function::{
    Function, FunctionArgs, FunctionDescriptor, FunctionRegistry, NativeFunction,
    ParameterDescriptor,
};
use crate::message::Message;
use crate::stream_cache::StreamCache;

fn message_param() -> ParameterDescriptor {
    ParameterDescriptor::object("message")
        .optional()
        .description("The message to use, defaults to '$message'")
}

pub fn register(registry: &mut FunctionRegistry) {
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("has_field")
            .returns(ValueType::Boolean)
            .param(ParameterDescriptor::string("field"))
            .param(message_param())
            .build(),
        has_field,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("set_field")
            .returns(ValueType::Void)
            .param(ParameterDescriptor::string("field"))
            .param(ParameterDescriptor::any("value"))
            .param(message_param())
            .description("Sets a field; an absent value leaves the message unchanged")
            .build(),
        set_field,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("set_fields")
            .returns(ValueType::Void)
            .param(ParameterDescriptor::map("fields"))
            .param(ParameterDescriptor::string("prefix").optional())
            .param(ParameterDescriptor::string("suffix").optional())
            .param(message_param())
            .build(),
        set_fields,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("remove_field")
            .returns(ValueType::Void)
            .param(ParameterDescriptor::string("field"))
            .param(message_param())
            .build(),
        remove_field,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("create_message")
            .returns(ValueType::Object)
            .param(ParameterDescriptor::string("message").optional())
            .param(ParameterDescriptor::string("source").optional())
            .param(ParameterDescriptor::string("timestamp").optional())
            .description("Creates a message that is processed after the current one")
            .build(),
        create_message,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("clone_message")
            .returns(ValueType::Object)
            .param(message_param())
            .build(),
        clone_message,
    ));
    registry.register(NativeFunction::new(
        FunctionDescriptor::builder("drop_message")
            .returns(ValueType::Void)
            .param(message_param())
            .build(),
        drop_message,
    ));
    registry.register(RouteToStream::new(None));
}

fn has_field(args: &mut FunctionArgs<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvalError> {
    let field = args.required_string("field", ctx)?;
    let handle = args.optional("message", ctx)?;
    let message = ctx.target(handle.as_ref())?;
    Ok(Value::Bool(message.has_field(&field)))
}

fn set_field(args: &mut FunctionArgs<'_>, ctx: &mut EvaluationContext<'_>) -> Result<Value, EvalError> {
    let field = args.required_string("field", ctx)?;
    let value = args.resolve("value", ctx)?;
    let handle = args.optional("message", ctx)?;
    let message = ctx.target(handle.as_ref())?;
    if !value.is_null() {
        message.set_field(&field, value);
    }
    Ok(Value::Null)
}

fn set_fields(
    args: &mut FunctionArgs<'_>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<Value, EvalError> {
    let fields = match args.optional("fields", ctx)? {
        Some(Value::Map(fields)) => fields,
        _ => return Ok(Value::Null),
    };
    let prefix = args.optional_string("prefix", ctx)?.unwrap_or_default();
    let suffix = args.optional_string("suffix", ctx)?.unwrap_or_default();
    let handle = args.optional("message", ctx)?;
    let message = ctx.target(handle.as_ref())?;
    for (name, value) in fields {
        message.set_field(&format!("{prefix}{name}{suffix}"), value);
    }
    Ok(Value::Null)
}

fn remove_field(
    args: &mut FunctionArgs<'_>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<Value, EvalError> {
    let field = args.required_string("field", ctx)?;
    let handle = args.optional("message", ctx)?;
    ctx.target(handle.as_ref())?.remove_field(&field);
    Ok(Value::Null)
}

/// New messages start in the streams of the message that created them.
fn create_message(
    args: &mut FunctionArgs<'_>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<Value, EvalError> {
    let text = args.optional_string("message", ctx)?.unwrap_or_default();
    let source = args.optional_string("source", ctx)?.unwrap_or_default();
    let timestamp = match args.optional_string("timestamp", ctx)? {
        Some(ts) => OffsetDateTime::parse(&ts, &Rfc3339).map_err(|e| {
            EvalError::function("create_message", format!("invalid timestamp '{ts}': {e}"))
        })?,
        None => OffsetDateTime::now_utc(),
    };
    let mut created = Message::new(&text, &source, timestamp);
    for stream in ctx.message().streams().clone() {
        created.add_stream(&stream);
    }
    debug!(parent = ctx.message().id(), child = created.id(), "created message");
    Ok(ctx.add_created(created).to_value())
}

fn clone_message(
    args: &mut FunctionArgs<'_>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<Value, EvalError> {
    let handle = args.optional("message", ctx)?;
    let copy = ctx.target(handle.as_ref())?.duplicate();
    Ok(ctx.add_created(copy).to_value())
}

fn drop_message(
    args: &mut FunctionArgs<'_>,
    ctx: &mut EvaluationContext<'_>,
) -> Result<Value, EvalError> {
    let handle = args.optional("message", ctx)?;
    ctx.target(handle.as_ref())?.drop_message();
    Ok(Value::Null)
}

// ──────────────────────────────────────────────
// Routing
// ──────────────────────────────────────────────

/// `route_to_stream(id?, name?, message?, remove_from_default?)`.
///
/// Routing by name needs a [`StreamCache`]; without one only ids are
/// accepted and they are not checked for existence.
pub struct RouteToStream {
    descriptor: FunctionDescriptor,
    streams: Option<Arc<StreamCache>>,
}

impl RouteToStream {
    pub fn new(streams: Option<Arc<StreamCache>>) -> Self {
        RouteToStream {
            descriptor: FunctionDescriptor::builder("route_to_stream")
                .returns(ValueType::Void)
                .param(ParameterDescriptor::string("id").optional())
                .param(ParameterDescriptor::string("name").optional())
                .param(message_param())
                .param(ParameterDescriptor::boolean("remove_from_default").optional())
                .description("Routes a message to a stream, by id or by title")
                .build(),
            streams,
        }
    }

    fn fail(&self, message: String) -> EvalError {
        EvalError::function(self.descriptor.name(), message)
    }

    /// Target stream id and whether matches leave the default stream.
    fn resolve_stream(
        &self,
        id: Option<String>,
        name: Option<String>,
    ) -> Result<(String, bool), EvalError> {
        match (id, name, &self.streams) {
            (Some(id), _, None) => Ok((id, false)),
            (Some(id), _, Some(cache)) => cache
                .by_id(&id)
                .map(|s| (s.id.clone(), s.remove_matches_from_default_stream))
                .ok_or_else(|| self.fail(format!("unknown stream id '{id}'"))),
            (None, Some(name), Some(cache)) => {
                let matches = cache.by_title(&name);
                match matches.as_slice() {
                    [stream] => Ok((stream.id.clone(), stream.remove_matches_from_default_stream)),
                    [] => Err(self.fail(format!("no stream named '{name}'"))),
                    _ => Err(self.fail(format!("stream name '{name}' is ambiguous"))),
                }
            }
            (None, Some(name), None) => {
                Err(self.fail(format!("cannot route by name '{name}' without a stream cache")))
            }
            (None, None, _) => Err(self.fail("either 'id' or 'name' is required".to_string())),
        }
    }
}

impl Function for RouteToStream {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &mut FunctionArgs<'_>,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Value, EvalError> {
        let id = args.optional_string("id", ctx)?;
        let name = args.optional_string("name", ctx)?;
        let handle = args.optional("message", ctx)?;
        let remove = args.optional_bool("remove_from_default", ctx)?;

        let (stream_id, stream_removes) = self.resolve_stream(id, name)?;
        let message = ctx.target(handle.as_ref())?;
        message.add_stream(&stream_id);
        if remove.unwrap_or(stream_removes) {
            message.remove_stream(DEFAULT_STREAM_ID);
        }
        debug!(message = message.id(), stream = %stream_id, "routed message");
        Ok(Value::Null)
    }
}
