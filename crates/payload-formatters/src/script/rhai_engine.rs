//! [`ScriptEngine`] backed by the Rhai scripting language.
//!
//! Every run builds a fresh Rhai engine on the blocking pool, so nothing a
//! script does survives the call. Module imports and `eval` are disabled;
//! Rhai itself exposes no filesystem or network access.

use super::{Environment, ExecutionError, ScriptEngine, ScriptValue};
use crate::config::ScriptConfig;
use async_trait::async_trait;
use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Dynamic, Engine, EvalAltResult, Scope};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Operations between two deadline and cancellation checks.
const PROGRESS_CHECK_INTERVAL: u64 = 256;

pub struct RhaiEngine {
    config: ScriptConfig,
}

impl RhaiEngine {
    pub fn new(config: ScriptConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }
}

impl Default for RhaiEngine {
    fn default() -> Self {
        Self::new(ScriptConfig::default())
    }
}

#[async_trait]
impl ScriptEngine for RhaiEngine {
    #[instrument(
        name = "script_run",
        skip_all,
        fields(script_size = script.len(), env_size = env.len())
    )]
    async fn run(
        &self,
        ctx: &CancellationToken,
        script: String,
        env: Environment,
    ) -> Result<ScriptValue, ExecutionError> {
        if ctx.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }

        let config = self.config.clone();
        // Time spent waiting for a blocking thread counts against the limit.
        let deadline = Instant::now() + config.timeout();
        let token = ctx.child_token();
        // Stops the evaluation if this future is dropped before it finishes.
        let _guard = token.clone().drop_guard();

        let handle = tokio::task::spawn_blocking(move || {
            evaluate(&config, &token, &script, env, deadline)
        });

        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                debug!("script run cancelled by caller");
                Err(ExecutionError::Cancelled)
            }
            result = handle => {
                result.map_err(|e| ExecutionError::Internal(e.to_string()))?
            }
        }
    }
}

fn build_engine(config: &ScriptConfig, token: &CancellationToken, deadline: Instant) -> Engine {
    let mut engine = Engine::new();

    engine
        .set_max_operations(config.max_operations)
        .set_max_call_levels(config.max_call_levels)
        .set_max_expr_depths(config.max_expr_depth, config.max_expr_depth)
        .set_max_string_size(config.max_string_size)
        .set_max_array_size(config.max_array_size)
        .set_max_map_size(config.max_map_size)
        .set_module_resolver(DummyModuleResolver::new());
    engine.disable_symbol("eval");

    engine.on_print(|text| debug!(target: "payload_formatters::script", "{text}"));
    engine.on_debug(|text, _source, pos| {
        debug!(target: "payload_formatters::script", position = %pos, "{text}");
    });

    let token = token.clone();
    engine.on_progress(move |operations| {
        if operations % PROGRESS_CHECK_INTERVAL != 0 {
            return None;
        }
        if token.is_cancelled() || Instant::now() >= deadline {
            return Some(Dynamic::UNIT);
        }
        None
    });

    engine
}

fn evaluate(
    config: &ScriptConfig,
    token: &CancellationToken,
    script: &str,
    env: Environment,
    deadline: Instant,
) -> Result<ScriptValue, ExecutionError> {
    let engine = build_engine(config, token, deadline);

    let env = env
        .into_iter()
        .map(|(k, v)| (k.into(), to_dynamic(v)))
        .collect::<rhai::Map>();
    let mut scope = Scope::new();
    scope.push_constant("env", env);

    let ast = engine
        .compile_with_scope(&scope, script)
        .map_err(|e| ExecutionError::Compile(e.to_string()))?;

    let value = engine
        .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
        .map_err(|e| map_eval_error(*e, config, token))?;

    from_dynamic(value)
}

fn map_eval_error(
    err: EvalAltResult,
    config: &ScriptConfig,
    token: &CancellationToken,
) -> ExecutionError {
    match err {
        EvalAltResult::ErrorTerminated(..) if token.is_cancelled() => ExecutionError::Cancelled,
        EvalAltResult::ErrorTerminated(..) => ExecutionError::Timeout(config.timeout()),
        EvalAltResult::ErrorTooManyOperations(..)
        | EvalAltResult::ErrorStackOverflow(..)
        | EvalAltResult::ErrorDataTooLarge(..) => ExecutionError::ResourceLimit(err.to_string()),
        EvalAltResult::ErrorParsing(..) => ExecutionError::Compile(err.to_string()),
        _ => ExecutionError::Runtime(err.to_string()),
    }
}

fn to_dynamic(value: ScriptValue) -> Dynamic {
    match value {
        ScriptValue::Unit => Dynamic::UNIT,
        ScriptValue::Bool(b) => Dynamic::from_bool(b),
        ScriptValue::Int(i) => Dynamic::from_int(i),
        ScriptValue::Float(f) => Dynamic::from_float(f),
        ScriptValue::String(s) => Dynamic::from(s),
        ScriptValue::Array(items) => {
            Dynamic::from_array(items.into_iter().map(to_dynamic).collect())
        }
        ScriptValue::Map(map) => Dynamic::from_map(
            map.into_iter()
                .map(|(k, v)| (k.into(), to_dynamic(v)))
                .collect(),
        ),
        ScriptValue::Blob(bytes) => Dynamic::from_blob(bytes),
    }
}

fn from_dynamic(value: Dynamic) -> Result<ScriptValue, ExecutionError> {
    let value = value.flatten();
    let unsupported = |type_name: &str| ExecutionError::UnsupportedValue(type_name.to_string());

    if value.is_unit() {
        return Ok(ScriptValue::Unit);
    }
    if let Ok(b) = value.as_bool() {
        return Ok(ScriptValue::Bool(b));
    }
    if let Ok(i) = value.as_int() {
        return Ok(ScriptValue::Int(i));
    }
    if let Ok(f) = value.as_float() {
        return Ok(ScriptValue::Float(f));
    }
    if let Ok(c) = value.as_char() {
        return Ok(ScriptValue::String(c.to_string()));
    }

    let type_name = value.type_name();
    if value.is_string() {
        return value
            .into_string()
            .map(ScriptValue::String)
            .map_err(unsupported);
    }
    if value.is_array() {
        let items = value
            .try_cast::<rhai::Array>()
            .ok_or_else(|| unsupported(type_name))?;
        return items
            .into_iter()
            .map(from_dynamic)
            .collect::<Result<Vec<_>, _>>()
            .map(ScriptValue::Array);
    }
    if value.is_map() {
        let map = value
            .try_cast::<rhai::Map>()
            .ok_or_else(|| unsupported(type_name))?;
        return map
            .into_iter()
            .map(|(k, v)| from_dynamic(v).map(|v| (k.to_string(), v)))
            .collect::<Result<_, _>>()
            .map(ScriptValue::Map);
    }
    if value.is_blob() {
        return value
            .try_cast::<rhai::Blob>()
            .map(ScriptValue::Blob)
            .ok_or_else(|| unsupported(type_name));
    }

    Err(unsupported(type_name))
}
