// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::any::Any;
use testbench_core::domain::object::{Object, ObjectCreatable};

/// Payload carried over the loopback link. The payload is derived from the
/// instance name so a run is reproducible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    name: String,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Copy with the first payload byte inverted.
    pub fn corrupted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(first) = copy.payload.first_mut() {
            *first = !*first;
        }
        copy
    }
}

impl Object for Packet {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ObjectCreatable for Packet {
    const TYPE_NAME: &'static str = "loopback_packet";

    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            payload: name.bytes().rev().collect(),
        }
    }
}
