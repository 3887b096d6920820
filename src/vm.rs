// COVENANT: Ledger-backed lifecycle engine for smart, Ricardian and marketplace contracts
//
// SPDX-License-Identifier: Apache-2.0
//
// Copyright (C) 2024-2025 COVENANT contributors.
// All rights under the above copyrights are reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except
// in compliance with the License. You may obtain a copy of the License at
//
//        http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express
// or implied. See the License for the specific language governing permissions and limitations under
// the License.

use core::str::FromStr;

use covenantapi::{ContractId, StateMap, Value};

use crate::{ErrorKind, GasSchedule};

/// State key under which the built-in `transfer` method keeps account balances.
pub const STATE_BALANCES: &str = "balances";

/// Everything an executor needs to know about a single call, except for the mutable state.
#[derive(Copy, Clone, Debug)]
pub struct CallContext<'a> {
    pub contract_id: &'a ContractId,
    pub code: &'a [u8],
    pub method: &'a str,
    pub params: &'a StateMap,
    pub caller: &'a str,
}

/// Contract code executor.
///
/// Executors operate on a working copy of the contract state: the engine commits the copy only
/// if the call returns successfully, so executors may bail out at any point without cleaning up.
pub trait Executor: Send + Sync {
    /// Executes `ctx.method`, charging all consumed gas to `meter`.
    ///
    /// # Returns
    ///
    /// Call result, which is stored in the execution log and returned to the caller.
    fn call(&self, ctx: CallContext<'_>, state: &mut StateMap, meter: &mut GasMeter) -> Result<StateMap, CallError>;
}

/// Logical bound on the cost of a single call.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct GasMeter {
    limit: u64,
    used: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self { GasMeter { limit, used: 0 } }

    pub fn limit(&self) -> u64 { self.limit }

    pub fn used(&self) -> u64 { self.used }

    pub fn remaining(&self) -> u64 { self.limit - self.used }

    /// Charges `amount` gas units; fails without charging anything if the limit would be exceeded.
    pub fn charge(&mut self, amount: u64) -> Result<(), CallError> {
        let required = self.used.saturating_add(amount);
        if required > self.limit {
            return Err(CallError::OutOfGas { limit: self.limit, required });
        }
        self.used = required;
        Ok(())
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum CallError {
    /// method '{0}' is not supported by the contract.
    UnknownMethod(String),

    /// the call requires {required} gas units, exceeding the limit of {limit}.
    OutOfGas { limit: u64, required: u64 },

    /// required parameter '{0}' is missing.
    MissingParam(String),

    /// parameter '{name}' must be {expected}, but {found} was given.
    InvalidParam { name: String, expected: &'static str, found: &'static str },

    /// state entry '{key}' holds {found} where {expected} is expected.
    StateType { key: String, expected: &'static str, found: &'static str },

    /// account '{account}' has balance {available}, which is insufficient to transfer {required}.
    InsufficientBalance { account: String, available: i64, required: i64 },

    /// state entry '{0}' overflows.
    Overflow(String),

    /// {0}
    Custom(String),
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::OutOfGas { .. } => ErrorKind::GasExceeded,
            CallError::UnknownMethod(_)
            | CallError::MissingParam(_)
            | CallError::InvalidParam { .. }
            | CallError::Custom(_) => ErrorKind::Validation,
            CallError::StateType { .. } | CallError::InsufficientBalance { .. } | CallError::Overflow(_) => {
                ErrorKind::InvalidState
            }
        }
    }
}

/// Methods provided by [`EmbeddedProc`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
#[display(lowercase)]
pub enum EmbeddedMethod {
    /// Does nothing; charges the base call price only.
    Noop,
    /// Writes every parameter into the state.
    Set,
    /// Reads the state entries named by the parameter keys.
    Get,
    /// Removes the state entries listed in the `keys` parameter.
    Remove,
    /// Adds integer `by` (default 1) to the integer state entry `key`.
    Increment,
    /// Moves `amount` from account `from` to account `to` inside the `balances` map.
    Transfer,
}

impl EmbeddedMethod {
    pub const ALL: [EmbeddedMethod; 6] = [
        EmbeddedMethod::Noop,
        EmbeddedMethod::Set,
        EmbeddedMethod::Get,
        EmbeddedMethod::Remove,
        EmbeddedMethod::Increment,
        EmbeddedMethod::Transfer,
    ];
}

impl FromStr for EmbeddedMethod {
    type Err = CallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.to_string() == s)
            .ok_or_else(|| CallError::UnknownMethod(s.to_owned()))
    }
}

/// Built-in executor with a fixed set of bookkeeping methods (see [`EmbeddedMethod`]).
///
/// The executor doesn't interpret contract code: any deployed contract supports the same methods.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct EmbeddedProc {
    gas: GasSchedule,
}

impl EmbeddedProc {
    pub fn new(gas: GasSchedule) -> Self { EmbeddedProc { gas } }

    pub fn gas_schedule(&self) -> GasSchedule { self.gas }

    fn set(&self, params: &StateMap, state: &mut StateMap, meter: &mut GasMeter) -> Result<StateMap, CallError> {
        let mut written = Vec::with_capacity(params.len());
        for (key, val) in params {
            meter.charge(self.gas.write)?;
            state.insert(key.clone(), val.clone());
            written.push(Value::from(key.as_str()));
        }
        Ok(bmap! { s!("written") => Value::List(written) })
    }

    fn get(&self, params: &StateMap, state: &StateMap, meter: &mut GasMeter) -> Result<StateMap, CallError> {
        let mut result = StateMap::new();
        for key in params.keys() {
            meter.charge(self.gas.read)?;
            result.insert(key.clone(), state.get(key).cloned().unwrap_or_default());
        }
        Ok(result)
    }

    fn remove(&self, params: &StateMap, state: &mut StateMap, meter: &mut GasMeter) -> Result<StateMap, CallError> {
        let keys = param(params, "keys")?;
        let keys = keys.as_list().ok_or_else(|| invalid_param("keys", "a list", keys))?;
        let mut result = StateMap::new();
        for key in keys {
            let key = key.as_str().ok_or_else(|| invalid_param("keys", "a list of strings", key))?;
            meter.charge(self.gas.write)?;
            result.insert(key.to_owned(), state.remove(key).unwrap_or_default());
        }
        Ok(result)
    }

    fn increment(&self, params: &StateMap, state: &mut StateMap, meter: &mut GasMeter) -> Result<StateMap, CallError> {
        let key = param_str(params, "key")?;
        let by = match params.get("by") {
            None => 1,
            Some(val) => val.as_i64().ok_or_else(|| invalid_param("by", "an integer", val))?,
        };

        meter.charge(self.gas.read)?;
        let current = match state.get(key) {
            None => 0,
            Some(val) => val.as_i64().ok_or_else(|| CallError::StateType {
                key: key.to_owned(),
                expected: "an integer",
                found: val.type_name(),
            })?,
        };
        let value = current
            .checked_add(by)
            .ok_or_else(|| CallError::Overflow(key.to_owned()))?;

        meter.charge(self.gas.write)?;
        state.insert(key.to_owned(), Value::Int(value));
        Ok(bmap! { s!("key") => Value::from(key), s!("value") => Value::Int(value) })
    }

    fn transfer(&self, params: &StateMap, state: &mut StateMap, meter: &mut GasMeter) -> Result<StateMap, CallError> {
        let from = param_str(params, "from")?;
        let to = param_str(params, "to")?;
        let amount = param(params, "amount")?;
        let amount = amount
            .as_i64()
            .filter(|amount| *amount > 0)
            .ok_or_else(|| invalid_param("amount", "a positive integer", amount))?;

        meter.charge(self.gas.read)?;
        let balances = state
            .entry(STATE_BALANCES.to_owned())
            .or_insert_with(|| Value::Map(none!()));
        let found = balances.type_name();
        let balances = balances.as_map_mut().ok_or_else(|| CallError::StateType {
            key: STATE_BALANCES.to_owned(),
            expected: "a map",
            found,
        })?;
        let balance = |balances: &StateMap, account: &str| -> Result<i64, CallError> {
            match balances.get(account) {
                None => Ok(0),
                Some(val) => val.as_i64().ok_or_else(|| CallError::StateType {
                    key: format!("{STATE_BALANCES}.{account}"),
                    expected: "an integer",
                    found: val.type_name(),
                }),
            }
        };

        let available = balance(&*balances, from)?;
        if available < amount {
            return Err(CallError::InsufficientBalance { account: from.to_owned(), available, required: amount });
        }
        meter.charge(self.gas.write)?;
        balances.insert(from.to_owned(), Value::Int(available - amount));

        let received = balance(&*balances, to)?
            .checked_add(amount)
            .ok_or_else(|| CallError::Overflow(format!("{STATE_BALANCES}.{to}")))?;
        meter.charge(self.gas.write)?;
        balances.insert(to.to_owned(), Value::Int(received));

        let from_balance = balance(&*balances, from)?;
        Ok(bmap! {
            s!("fromBalance") => Value::Int(from_balance),
            s!("toBalance") => Value::Int(received),
        })
    }
}

impl Executor for EmbeddedProc {
    fn call(&self, ctx: CallContext<'_>, state: &mut StateMap, meter: &mut GasMeter) -> Result<StateMap, CallError> {
        let method = EmbeddedMethod::from_str(ctx.method)?;
        meter.charge(self.gas.call)?;
        match method {
            EmbeddedMethod::Noop => Ok(none!()),
            EmbeddedMethod::Set => self.set(ctx.params, state, meter),
            EmbeddedMethod::Get => self.get(ctx.params, state, meter),
            EmbeddedMethod::Remove => self.remove(ctx.params, state, meter),
            EmbeddedMethod::Increment => self.increment(ctx.params, state, meter),
            EmbeddedMethod::Transfer => self.transfer(ctx.params, state, meter),
        }
    }
}

fn param<'a>(params: &'a StateMap, name: &str) -> Result<&'a Value, CallError> {
    params
        .get(name)
        .ok_or_else(|| CallError::MissingParam(name.to_owned()))
}

fn param_str<'a>(params: &'a StateMap, name: &str) -> Result<&'a str, CallError> {
    let val = param(params, name)?;
    val.as_str().ok_or_else(|| invalid_param(name, "a string", val))
}

fn invalid_param(name: &str, expected: &'static str, found: &Value) -> CallError {
    CallError::InvalidParam { name: name.to_owned(), expected, found: found.type_name() }
}
