// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use proc_macro2::TokenStream;
use quote::quote;

/// File-level attributes and imports shared by everything the generator
/// emits.
///
/// Synthesized record names join path segments with underscores, so the
/// non-camel-case lint is silenced for the whole generated file.
pub fn emit() -> TokenStream {
    let module_doc_string = " @generated rust packet definitions, do not edit.";
    quote! {
        #![doc = #module_doc_string]
        #![allow(non_camel_case_types)]
        #![allow(unused_imports)]

        use protodef_runtime::{
            cautious_capacity, read_rest_buffer, read_varint, read_varlong, ConnectionState,
            Decode, DecodeError, PacketDirection,
        };
    }
}
