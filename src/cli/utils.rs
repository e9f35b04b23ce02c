use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// One-line outcome, with an optional payload for JSON consumers
    pub fn success(self, message: &str, data: Option<Value>) -> anyhow::Result<()> {
        match self {
            OutputFormat::Json => {
                let mut body = serde_json::json!({ "success": true, "message": message });
                if let Some(data) = data {
                    body["data"] = data;
                }
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
            OutputFormat::Text => println!("✓ {}", message),
        }
        Ok(())
    }

    /// Structured value: pretty JSON, or YAML for humans
    pub fn value(self, value: &Value) -> anyhow::Result<()> {
        match self {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => print!("{}", serde_yaml::to_string(value)?),
        }
        Ok(())
    }
}
