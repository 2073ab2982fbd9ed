// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An in-process stand-in for a Redis connection understanding `GET` and `PSETEX`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use redis::aio::ConnectionLike;
use redis::{Arg, Cmd, ErrorKind, Pipeline, RedisError, RedisFuture, RedisResult, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FakeCommand {
    Get(String),
    PSetEx { key: String, millis: u64, value: Vec<u8> },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeRedis {
    values: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    commands: Arc<Mutex<Vec<FakeCommand>>>,
    failing: Arc<Mutex<bool>>,
}

impl FakeRedis {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn seed(&self, key: &str, value: Vec<u8>) {
        self.values.lock().insert(key.to_string(), value);
    }

    pub(crate) fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.values.lock().get(key).cloned()
    }

    pub(crate) fn commands(&self) -> Vec<FakeCommand> {
        self.commands.lock().clone()
    }

    pub(crate) fn fail(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    fn apply(&self, cmd: &Cmd) -> RedisResult<Value> {
        if *self.failing.lock() {
            return Err(RedisError::from((ErrorKind::IoError, "connection reset")));
        }

        let args: Vec<String> = cmd
            .args_iter()
            .filter_map(|arg| match arg {
                Arg::Simple(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
                Arg::Cursor => None,
            })
            .collect();

        match args.first().map(String::as_str) {
            Some("GET") => {
                let key = args[1].clone();
                let value = self.value(&key);
                self.commands.lock().push(FakeCommand::Get(key));
                Ok(value.map_or(Value::Nil, Value::BulkString))
            }
            Some("PSETEX") => {
                let key = args[1].clone();
                let millis = args[2].parse().unwrap();
                let value = raw_arg(cmd, 3);
                self.values.lock().insert(key.clone(), value.clone());
                self.commands.lock().push(FakeCommand::PSetEx { key, millis, value });
                Ok(Value::Okay)
            }
            other => Err(RedisError::from((
                ErrorKind::ClientError,
                "unsupported command",
                format!("{other:?}"),
            ))),
        }
    }
}

// Values are binary, so they are read without the lossy conversion.
fn raw_arg(cmd: &Cmd, index: usize) -> Vec<u8> {
    match cmd.args_iter().nth(index) {
        Some(Arg::Simple(bytes)) => bytes.to_vec(),
        _ => Vec::new(),
    }
}

impl ConnectionLike for FakeRedis {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        let result = self.apply(cmd);
        Box::pin(async move { result })
    }

    fn req_packed_commands<'a>(&'a mut self, _cmd: &'a Pipeline, _offset: usize, _count: usize) -> RedisFuture<'a, Vec<Value>> {
        Box::pin(async { Err(RedisError::from((ErrorKind::ClientError, "pipelines are not supported"))) })
    }

    fn get_db(&self) -> i64 {
        0
    }
}
