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

//! Identifier naming policy.
//!
//! Pure functions shared by the resolver, the catalog and the emitter:
//! case conversion, reserved-word escaping and composite-name synthesis
//! for hoisted nested records.

use heck::{ToSnakeCase, ToUpperCamelCase};

/// Rust keywords that appear as field names in the schema. Escaped with a
/// trailing underscore rather than a raw identifier so the generated
/// field names stay readable.
const RESERVED: [&str; 2] = ["type", "match"];

/// Lower-case word-separated form, e.g. `serverHost` -> `server_host`.
pub fn to_snake(name: &str) -> String {
    name.to_snake_case()
}

/// Capitalized concatenated form, e.g. `set_protocol` -> `SetProtocol`.
pub fn to_pascal(name: &str) -> String {
    name.to_upper_camel_case()
}

/// Canonical field name: snake case with reserved words escaped.
pub fn field_name(raw: &str) -> String {
    let name = to_snake(raw);
    if RESERVED.contains(&name.as_str()) {
        name + "_"
    } else {
        name
    }
}

/// Name of a hoisted nested record: the enclosing packet's name followed
/// by the titleized name of every field on the nesting path, in
/// declaration order. Including the whole path keeps synthesized names
/// distinct for any two sibling fields and stays order sensitive.
pub fn hoisted_record_name(packet: &str, field_path: &[String]) -> String {
    let mut name = packet.to_owned();
    for field in field_path {
        name.push('_');
        name.push_str(&to_pascal(field));
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_conversion_round_trips() {
        for name in ["foo", "foo_bar", "server_host", "x"] {
            assert_eq!(to_snake(&to_pascal(name)), name);
        }
        assert_eq!(to_pascal("foo_bar"), "FooBar");
        assert_eq!(to_snake("FooBar"), "foo_bar");
    }

    #[test]
    fn reserved_words_get_a_trailing_marker() {
        assert_eq!(field_name("type"), "type_");
        assert_eq!(field_name("match"), "match_");
        // Case conversion applies before the reserved-word rule.
        assert_eq!(field_name("Count"), "count");
        assert_eq!(field_name("entityId"), "entity_id");
    }

    #[test]
    fn hoisted_names_include_every_path_segment() {
        let packet = "TabCompleteResponse";
        assert_eq!(
            hoisted_record_name(packet, &["matches".to_owned()]),
            "TabCompleteResponse_Matches"
        );
        assert_eq!(
            hoisted_record_name(packet, &["matches".to_owned(), "tooltip".to_owned()]),
            "TabCompleteResponse_Matches_Tooltip"
        );
    }

    #[test]
    fn hoisted_names_are_order_sensitive() {
        let a = hoisted_record_name("P", &["foo".to_owned(), "bar".to_owned()]);
        let b = hoisted_record_name("P", &["bar".to_owned(), "foo".to_owned()]);
        assert_ne!(a, b);
    }

    #[test]
    fn sibling_fields_synthesize_distinct_names() {
        let a = hoisted_record_name("Packet", &["first".to_owned()]);
        let b = hoisted_record_name("Packet", &["second".to_owned()]);
        assert_ne!(a, b);
    }
}
