//! Conversions between Portal values and other data formats.

pub mod json;
pub mod toml;
pub mod yaml;

use anyhow::Result;
use clap::ValueEnum;
use libportal::yaml::DumpOptions;
use libportal::Value;

/// Input formats accepted by `portal convert`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// Lenient YAML subset loaded by the Portal engine.
    Lenient,
    /// Conforming YAML.
    Yaml,
    Json,
    Toml,
}

/// Output formats produced by `portal convert`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// YAML written by the Portal dumper.
    Yaml,
    /// Conforming YAML written by serde_yaml.
    YamlStrict,
    Json,
    Toml,
}

pub fn decode(input: &str, format: InputFormat) -> Result<Value> {
    match format {
        InputFormat::Lenient => Ok(libportal::yaml::parse(input)),
        InputFormat::Yaml => yaml::decode(input),
        InputFormat::Json => json::decode(input),
        InputFormat::Toml => toml::decode(input),
    }
}

pub fn encode(value: &Value, format: OutputFormat, options: &DumpOptions) -> Result<String> {
    match format {
        OutputFormat::Yaml => Ok(libportal::yaml::dump_with_options(value, options)),
        OutputFormat::YamlStrict => yaml::encode(value),
        OutputFormat::Json => json::encode(value),
        OutputFormat::Toml => toml::encode(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_to_json() {
        let value = decode("name: Portal\nsites:\n  - Mail\n", InputFormat::Lenient).unwrap();
        let text = encode(&value, OutputFormat::Json, &DumpOptions::default()).unwrap();
        assert_eq!(text, "{\n  \"name\": \"Portal\",\n  \"sites\": [\n    \"Mail\"\n  ]\n}\n");
    }

    #[test]
    fn test_json_to_lenient_yaml() {
        let value = decode(r#"{"name": "Portal", "small": true}"#, InputFormat::Json).unwrap();
        let text = encode(&value, OutputFormat::Yaml, &DumpOptions::default()).unwrap();
        assert_eq!(text, "---\nname: Portal\nsmall: true\n");
    }
}
