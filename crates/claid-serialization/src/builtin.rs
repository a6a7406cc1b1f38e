// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Wrapper messages for plain values.
//!
//! Integers and floating point numbers use separate wrappers so a channel
//! declared with an `i32` example is not compatible with one declared with
//! an `f64` example.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::claid_message;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntVal {
    pub val: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoubleVal {
    pub val: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoolVal {
    pub val: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StringVal {
    pub val: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumberArray {
    pub val: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StringArray {
    pub val: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumberMap {
    pub val: HashMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StringMap {
    pub val: HashMap<String, String>,
}

claid_message!(IntVal, "claidservice.IntVal");
claid_message!(DoubleVal, "claidservice.DoubleVal");
claid_message!(BoolVal, "claidservice.BoolVal");
claid_message!(StringVal, "claidservice.StringVal");
claid_message!(NumberArray, "claidservice.NumberArray");
claid_message!(StringArray, "claidservice.StringArray");
claid_message!(NumberMap, "claidservice.NumberMap");
claid_message!(StringMap, "claidservice.StringMap");
