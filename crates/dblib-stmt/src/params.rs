//! RPC parameter binding.
//!
//! The host's binding driver reports each parameter's lifecycle through
//! the events below, and [`ParamBinder`] keeps the per-parameter driver
//! state between them in a side table keyed by [`ParamKey`].
//!
//! ```text
//! normalize -> alloc -> (per execution: prepare_value -> bind -> retrieve*) -> free
//! ```

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use dblib_types::{HostValue, ParamType, Policy, TdsVersion, TypeId, materialize};

use crate::error::{Error, Result};
use crate::process::{DbProcess, RpcParam, RpcStatus};

/// Reserved name of the parameter that captures a procedure's return
/// status.
pub const RETURN_STATUS_NAME: &str = "@RETVAL";

/// Strings longer than this are sent as `text`.
pub const VARCHAR_MAX_BYTES: usize = 8000;

/// Parameter identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamKey {
    /// 0-based position of a `?` marker.
    Position(u32),
    /// Name of a `:name` marker.
    Named(String),
}

impl ParamKey {
    /// Named parameter key.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Rewrite the host's `:` name prefix to the protocol's `@`.
    #[must_use]
    pub fn normalize(self) -> Self {
        match self {
            Self::Named(name) => {
                let bare = name.strip_prefix([':', '@']).unwrap_or(name.as_str());
                Self::Named(format!("@{bare}"))
            }
            positional => positional,
        }
    }

    /// Name passed with the RPC parameter; positional parameters go unnamed.
    #[must_use]
    pub fn rpc_name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Position(_) => None,
        }
    }

    /// Check for the reserved return-status name.
    #[must_use]
    pub fn is_return_status_name(&self) -> bool {
        self.rpc_name()
            .is_some_and(|name| name.starts_with(RETURN_STATUS_NAME))
    }
}

impl fmt::Display for ParamKey {
    /// `@name` for named parameters, `@N` (1-based) for positional ones,
    /// matching the rewritten marker text.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position(n) => write!(f, "@{}", u64::from(*n) + 1),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Declared direction of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamDirection {
    /// Value is only sent.
    #[default]
    Input,
    /// Value is sent and the server's returned value is copied back.
    InputOutput,
}

/// A parameter declared by the caller, with the host variable it is
/// bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    /// Identity.
    pub key: ParamKey,
    /// Direction.
    pub direction: ParamDirection,
    /// Declared type hint.
    pub param_type: ParamType,
    /// Current value of the bound variable.
    pub value: HostValue,
}

impl BoundParam {
    /// Create an input parameter with the default string hint.
    pub fn new(key: ParamKey, value: impl Into<HostValue>) -> Self {
        Self {
            key,
            direction: ParamDirection::Input,
            param_type: ParamType::Str,
            value: value.into(),
        }
    }

    /// Mark as input-output.
    #[must_use]
    pub fn output(mut self) -> Self {
        self.direction = ParamDirection::InputOutput;
        self
    }

    /// Set the type hint.
    #[must_use]
    pub fn with_type(mut self, param_type: ParamType) -> Self {
        self.param_type = param_type;
        self
    }

    /// Check whether the direction includes output.
    #[must_use]
    pub fn is_output(&self) -> bool {
        self.direction == ParamDirection::InputOutput
    }
}

/// Driver state of one bound parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ParamState {
    /// Request the value back from the server.
    pub output: bool,
    /// Captures the procedure's return status instead of an output value.
    pub return_status: bool,
    /// Wire type chosen by the value phase.
    pub wire_type: TypeId,
    /// Encoded value; `None` for null.
    pub value: Option<Bytes>,
    /// Output-value slot assigned by the last bind.
    pub return_pos: Option<usize>,
}

impl ParamState {
    fn new(output: bool, return_status: bool) -> Self {
        Self {
            output,
            return_status,
            wire_type: TypeId::VarChar,
            value: None,
            return_pos: None,
        }
    }

    /// Declared length of the value; fixed-width types report none.
    fn value_len(&self) -> Option<usize> {
        match self.wire_type {
            TypeId::VarChar | TypeId::Text => Some(self.value.as_ref().map_or(0, Bytes::len)),
            _ => None,
        }
    }
}

/// Side table of per-parameter driver state.
#[derive(Debug, Default)]
pub struct ParamBinder {
    states: HashMap<ParamKey, ParamState>,
    return_count: usize,
}

impl ParamBinder {
    /// Create an empty binder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver state for a parameter.
    #[must_use]
    pub fn state(&self, key: &ParamKey) -> Option<&ParamState> {
        self.states.get(key)
    }

    /// Output parameters bound by the last execution.
    #[must_use]
    pub fn return_count(&self) -> usize {
        self.return_count
    }

    /// Create driver state for a newly declared parameter.
    pub fn alloc(&mut self, param: &BoundParam) {
        let output = param.is_output();
        let return_status = output && param.key.is_return_status_name();
        self.states
            .insert(param.key.clone(), ParamState::new(output, return_status));
    }

    /// Release a parameter's driver state.
    pub fn free(&mut self, key: &ParamKey) {
        self.states.remove(key);
    }

    /// Resolve the wire type and encode the value of one parameter.
    ///
    /// Coercions write back into the bound variable, as the host does.
    pub fn prepare_value(&mut self, param: &mut BoundParam, version: TdsVersion) -> Result<()> {
        let state = self
            .states
            .get_mut(&param.key)
            .ok_or_else(|| Error::UnknownParam(param.key.to_string()))?;
        if state.return_status {
            return Ok(());
        }

        let (wire_type, value) = match resolve(param)? {
            Resolved::Null => (TypeId::VarChar, None),
            Resolved::Bool(v) => (TypeId::Int1, Some(Bytes::copy_from_slice(&[u8::from(v != 0)]))),
            Resolved::Int(v) => (TypeId::Int8, Some(Bytes::copy_from_slice(&v.to_le_bytes()))),
            Resolved::Double(v) => (TypeId::Float8, Some(Bytes::copy_from_slice(&v.to_le_bytes()))),
            Resolved::Str(s) if s.len() <= VARCHAR_MAX_BYTES => (TypeId::VarChar, Some(s)),
            Resolved::Str(s) if state.output && !version.supports_large_parameters() => {
                tracing::warn!(
                    param = %param.key,
                    len = s.len(),
                    %version,
                    "falling back to varchar(8000)"
                );
                (TypeId::VarChar, Some(s))
            }
            Resolved::Str(s) => (TypeId::Text, Some(s)),
        };

        tracing::trace!(param = %param.key, wire_type = ?wire_type, "resolved parameter type");
        state.wire_type = wire_type;
        state.value = value;
        Ok(())
    }

    /// Reset output-slot assignment before binding a new call.
    pub fn begin_binding(&mut self) {
        self.return_count = 0;
        for state in self.states.values_mut() {
            state.return_pos = None;
        }
    }

    /// Attach one parameter to the RPC call being built.
    ///
    /// Output parameters get the next output-value slot.
    pub fn bind<P: DbProcess + ?Sized>(&mut self, process: &mut P, key: &ParamKey) -> Result<()> {
        let state = self
            .states
            .get_mut(key)
            .ok_or_else(|| Error::UnknownParam(key.to_string()))?;
        if state.return_status {
            return Ok(());
        }

        let mut status = RpcStatus::empty();
        let mut max_len = None;
        if state.output {
            status |= RpcStatus::RETURN;
            state.return_pos = Some(self.return_count);
            self.return_count += 1;
            max_len = Some(state.value_len().unwrap_or(0).max(VARCHAR_MAX_BYTES));
        }

        tracing::trace!(
            param = %key,
            wire_type = ?state.wire_type,
            return_pos = ?state.return_pos,
            "binding parameter"
        );

        let rpc_param = RpcParam {
            name: key.rpc_name(),
            status,
            type_code: state.wire_type.code(),
            max_len,
            value: state.value.as_deref(),
        };
        process.rpc_param(&rpc_param).map_err(|_| Error::RpcBind {
            name: key.to_string(),
        })
    }

    /// Copy the server's returned value into an input-output parameter.
    ///
    /// Leaves the variable unchanged when the server returned nothing.
    pub fn retrieve<P: DbProcess + ?Sized>(
        &self,
        process: &P,
        policy: &Policy,
        param: &mut BoundParam,
    ) -> Result<()> {
        if !param.is_output() {
            return Ok(());
        }
        let Some(state) = self.states.get(&param.key) else {
            return Ok(());
        };

        if state.return_status {
            if process.has_return_status() {
                param.value = HostValue::Int(i64::from(process.return_status()));
            }
            return Ok(());
        }

        let available = process.return_count();
        if available == 0 {
            return Ok(());
        }
        let Some(position) = state.return_pos else {
            return Ok(());
        };
        if position >= available {
            return Err(Error::MissingOutputParam {
                position,
                available,
            });
        }

        param.value = materialize(
            process.return_type(position),
            process.return_data(position),
            policy,
            process,
        );
        Ok(())
    }

    /// Whether this parameter sorts with the return-status parameter.
    fn is_return_status(&self, key: &ParamKey) -> bool {
        self.states.get(key).is_some_and(|s| s.return_status)
    }

    /// Order parameters for binding: positional ascending, then named in
    /// declaration order, then the return-status parameter.
    pub fn sort_for_binding(&self, params: &mut [BoundParam]) {
        params.sort_by(|a, b| self.bind_rank(&a.key).cmp(&self.bind_rank(&b.key)));
    }

    fn bind_rank(&self, key: &ParamKey) -> BindRank {
        if self.is_return_status(key) {
            BindRank::ReturnStatus
        } else {
            match key {
                ParamKey::Position(n) => BindRank::Positional(*n),
                ParamKey::Named(_) => BindRank::Named,
            }
        }
    }
}

/// Sort key for bind order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum BindRank {
    Positional(u32),
    Named,
    ReturnStatus,
}

/// Host value after applying the type hint.
enum Resolved {
    Null,
    Bool(i64),
    Int(i64),
    Double(f64),
    Str(Bytes),
}

fn resolve(param: &mut BoundParam) -> Result<Resolved> {
    let hint = param.param_type;

    if hint == ParamType::Null || param.value.is_null() {
        return Ok(Resolved::Null);
    }

    if hint == ParamType::Bool || matches!(param.value, HostValue::Bool(_)) {
        let v = i64::from(param.value.coerce_to_int() != 0);
        param.value = HostValue::Int(v);
        return Ok(Resolved::Bool(v));
    }

    if hint == ParamType::Int {
        if !matches!(param.value, HostValue::Int(_) | HostValue::Double(_)) {
            param.value = HostValue::Int(param.value.coerce_to_int());
        }
    } else if hint != ParamType::Variant && !matches!(param.value, HostValue::Str(_)) {
        let s = param
            .value
            .coerce_to_string()
            .map_err(|_| Error::UnsupportedParamType {
                type_name: param.value.type_name(),
            })?;
        param.value = HostValue::Str(s);
    }

    match &param.value {
        HostValue::Null => Ok(Resolved::Null),
        HostValue::Int(v) => Ok(Resolved::Int(*v)),
        HostValue::Double(v) => Ok(Resolved::Double(*v)),
        HostValue::Str(s) => Ok(Resolved::Str(s.clone())),
        other @ (HostValue::Bool(_) | HostValue::List(_) | HostValue::Map(_)) => {
            Err(Error::UnsupportedParamType {
                type_name: other.type_name(),
            })
        }
    }
}

/// `sp_executesql` declaration type for a resolved wire type.
///
/// The 1-byte integer carrying bool parameters is declared `bit` deliberately.
#[must_use]
pub fn declaration_type(wire_type: TypeId) -> &'static str {
    match wire_type {
        TypeId::Float8 => "float",
        TypeId::Int8 => "int",
        TypeId::Bit | TypeId::Int1 => "bit",
        TypeId::Text => "text",
        _ => "varchar(8000)",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn prepared(param: &mut BoundParam, version: TdsVersion) -> ParamState {
        let mut binder = ParamBinder::new();
        binder.alloc(param);
        binder.prepare_value(param, version).unwrap();
        binder.state(&param.key).unwrap().clone()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(ParamKey::named(":x").normalize(), ParamKey::named("@x"));
        assert_eq!(ParamKey::named("@x").normalize(), ParamKey::named("@x"));
        assert_eq!(ParamKey::named("x").normalize(), ParamKey::named("@x"));
        assert_eq!(ParamKey::Position(3).normalize(), ParamKey::Position(3));
    }

    #[test]
    fn test_display() {
        assert_eq!(ParamKey::Position(0).to_string(), "@1");
        assert_eq!(ParamKey::named("@a").to_string(), "@a");
    }

    #[test]
    fn test_alloc_flags() {
        let mut binder = ParamBinder::new();
        let retval = BoundParam::new(ParamKey::named("@RETVAL"), HostValue::Null).output();
        let out = BoundParam::new(ParamKey::named("@out"), 1i64).output();
        let input_retval = BoundParam::new(ParamKey::named("@RETVAL"), 1i64);
        binder.alloc(&retval);
        binder.alloc(&out);

        let s = binder.state(&retval.key).unwrap();
        assert!(s.output && s.return_status);
        let s = binder.state(&out.key).unwrap();
        assert!(s.output && !s.return_status);

        binder.alloc(&input_retval);
        let s = binder.state(&input_retval.key).unwrap();
        assert!(!s.output && !s.return_status);
    }

    #[test]
    fn test_value_phase_types() {
        let v = TdsVersion::V7_4;

        let mut p = BoundParam::new(ParamKey::Position(0), HostValue::Null);
        let s = prepared(&mut p, v);
        assert_eq!((s.wire_type, s.value), (TypeId::VarChar, None));

        let mut p = BoundParam::new(ParamKey::Position(0), true);
        let s = prepared(&mut p, v);
        assert_eq!(s.wire_type, TypeId::Int1);
        assert_eq!(s.value.as_deref(), Some(&[1u8][..]));
        assert_eq!(p.value, HostValue::Int(1));

        let mut p = BoundParam::new(ParamKey::Position(0), 7i64).with_type(ParamType::Int);
        let s = prepared(&mut p, v);
        assert_eq!(s.wire_type, TypeId::Int8);
        assert_eq!(s.value.as_deref(), Some(&7i64.to_le_bytes()[..]));

        let mut p = BoundParam::new(ParamKey::Position(0), 2.5).with_type(ParamType::Int);
        assert_eq!(prepared(&mut p, v).wire_type, TypeId::Float8);

        let mut p = BoundParam::new(ParamKey::Position(0), "12").with_type(ParamType::Int);
        assert_eq!(prepared(&mut p, v).wire_type, TypeId::Int8);
        assert_eq!(p.value, HostValue::Int(12));

        let mut p = BoundParam::new(ParamKey::Position(0), 2.5).with_type(ParamType::Variant);
        assert_eq!(prepared(&mut p, v).wire_type, TypeId::Float8);

        let mut p = BoundParam::new(ParamKey::Position(0), 42i64);
        let s = prepared(&mut p, v);
        assert_eq!(s.wire_type, TypeId::VarChar);
        assert_eq!(s.value.as_deref(), Some(&b"42"[..]));
        assert_eq!(p.value, HostValue::from("42"));
    }

    #[test]
    fn test_bool_hint_on_string() {
        let mut p = BoundParam::new(ParamKey::Position(0), "0").with_type(ParamType::Bool);
        let s = prepared(&mut p, TdsVersion::V7_4);
        assert_eq!(s.wire_type, TypeId::Int1);
        assert_eq!(s.value.as_deref(), Some(&[0u8][..]));

        let mut p = BoundParam::new(ParamKey::Position(0), "5").with_type(ParamType::Bool);
        let s = prepared(&mut p, TdsVersion::V7_4);
        assert_eq!(s.value.as_deref(), Some(&[1u8][..]));
        assert_eq!(p.value, HostValue::Int(1));
    }

    #[test]
    fn test_long_strings() {
        let long = "x".repeat(VARCHAR_MAX_BYTES + 1);

        let mut p = BoundParam::new(ParamKey::Position(0), "x".repeat(VARCHAR_MAX_BYTES));
        assert_eq!(prepared(&mut p, TdsVersion::V7_4).wire_type, TypeId::VarChar);

        let mut p = BoundParam::new(ParamKey::Position(0), long.as_str());
        assert_eq!(prepared(&mut p, TdsVersion::V7_1).wire_type, TypeId::Text);

        let mut p = BoundParam::new(ParamKey::Position(0), long.as_str()).output();
        assert_eq!(prepared(&mut p, TdsVersion::V7_4).wire_type, TypeId::Text);

        let mut p = BoundParam::new(ParamKey::Position(0), long.as_str()).output();
        assert_eq!(prepared(&mut p, TdsVersion::V7_1).wire_type, TypeId::VarChar);
    }

    #[test]
    fn test_compound_rejected() {
        for hint in [ParamType::Str, ParamType::Variant, ParamType::Lob] {
            let mut binder = ParamBinder::new();
            let mut p = BoundParam::new(ParamKey::Position(0), HostValue::List(Vec::new()))
                .with_type(hint);
            binder.alloc(&p);
            let err = binder.prepare_value(&mut p, TdsVersion::V7_4).unwrap_err();
            assert_eq!(err, Error::UnsupportedParamType { type_name: "array" });
        }
    }

    #[test]
    fn test_return_status_skips_value_phase() {
        let mut binder = ParamBinder::new();
        let mut p = BoundParam::new(ParamKey::named("@RETVAL"), HostValue::List(Vec::new())).output();
        binder.alloc(&p);
        binder.prepare_value(&mut p, TdsVersion::V7_4).unwrap();
        assert_eq!(binder.state(&p.key).unwrap().value, None);
    }

    #[test]
    fn test_unknown_param() {
        let mut binder = ParamBinder::new();
        let mut p = BoundParam::new(ParamKey::Position(0), 1i64);
        assert!(matches!(
            binder.prepare_value(&mut p, TdsVersion::V7_4),
            Err(Error::UnknownParam(_))
        ));
    }

    #[test]
    fn test_sort_for_binding() {
        let mut binder = ParamBinder::new();
        let mut params = vec![
            BoundParam::new(ParamKey::Position(2), 1i64),
            BoundParam::new(ParamKey::named("@RETVAL"), HostValue::Null).output(),
            BoundParam::new(ParamKey::Position(0), 1i64),
            BoundParam::new(ParamKey::named("@x"), 1i64),
            BoundParam::new(ParamKey::named("@y"), 1i64),
        ];
        for p in &params {
            binder.alloc(p);
        }

        binder.sort_for_binding(&mut params);
        let keys: Vec<String> = params.iter().map(|p| p.key.to_string()).collect();
        assert_eq!(keys, ["@1", "@3", "@x", "@y", "@RETVAL"]);
    }

    #[test]
    fn test_declaration_types() {
        assert_eq!(declaration_type(TypeId::Float8), "float");
        assert_eq!(declaration_type(TypeId::Int8), "int");
        assert_eq!(declaration_type(TypeId::Int1), "bit");
        assert_eq!(declaration_type(TypeId::Text), "text");
        assert_eq!(declaration_type(TypeId::VarChar), "varchar(8000)");
    }
}
