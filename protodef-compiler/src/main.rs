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

//! Protodef schema compiler.

use std::fs;
use std::path::PathBuf;

use argh::FromArgs;

#[derive(FromArgs, Debug)]
/// Protodef schema analyzer and Rust generator.
struct Opt {
    #[argh(switch)]
    /// print tool version and exit.
    version: bool,

    #[argh(positional)]
    /// input protocol schema file (JSON).
    input_file: Option<PathBuf>,

    #[argh(option)]
    /// write the generated code to this file.
    /// If omitted, the generated code will be printed to stdout.
    output_file: Option<PathBuf>,
}

fn main() -> Result<(), String> {
    let opt: Opt = argh::from_env();

    if opt.version {
        println!("protodefc {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let Some(input_file) = opt.input_file.as_ref() else {
        return Err("No input file is specified".to_owned());
    };

    let source = fs::read_to_string(input_file)
        .map_err(|err| format!("Could not read {}: {err}", input_file.display()))?;
    let generated = protodef_compiler::compile(&source).map_err(|err| err.to_string())?;

    match opt.output_file.as_ref() {
        Some(path) => fs::write(path, generated)
            .map_err(|err| format!("Could not write {}: {err}", path.display()))?,
        None => print!("{generated}"),
    }

    Ok(())
}
