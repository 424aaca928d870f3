use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::fmt::Debug;

use crate::{
    config::Config,
    error::AgentError,
    llm::{FunctionDefinition, ToolDefinition},
    lookup::{GeocodingClient, WeatherClient},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolId {
    CityName,
    WeatherData,
}

impl ToolId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolId::CityName => "get_city_name",
            ToolId::WeatherData => "get_weather_data",
        }
    }

    pub const fn all() -> &'static [ToolId] {
        &[ToolId::CityName, ToolId::WeatherData]
    }
}

impl std::fmt::Display for ToolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ToolId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "get_city_name" => Ok(ToolId::CityName),
            "get_weather_data" => Ok(ToolId::WeatherData),
            _ => Err(anyhow::anyhow!(
                "Unknown tool '{value}'. Supported tools: get_city_name, get_weather_data."
            )),
        }
    }
}

/// A capability the model may invoke by name.
#[async_trait]
pub trait Tool: Send + Sync + Debug {
    fn id(&self) -> ToolId;

    fn description(&self) -> &'static str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    /// Run the tool and render its result as text for the model.
    async fn call(&self, args: &Value) -> anyhow::Result<String>;
}

/// Resolves an ambiguous or misspelled place to a canonical record.
#[derive(Debug, Clone)]
pub struct GeocodeTool {
    client: GeocodingClient,
}

impl GeocodeTool {
    pub fn new(client: GeocodingClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GeocodeTool {
    fn id(&self) -> ToolId {
        ToolId::CityName
    }

    fn description(&self) -> &'static str {
        "Looks up a place with the OpenStreetMap geocoder and returns the best matching \
         address record, or 'City not found' when nothing matches."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "Free-text place name, e.g. 'Springfield, IL'"
                }
            },
            "required": ["location"]
        })
    }

    async fn call(&self, args: &Value) -> anyhow::Result<String> {
        let location = string_arg(self.id(), args, "location")?;
        let place = self.client.resolve(location).await?;
        Ok(place.to_observation())
    }
}

/// Current conditions for a city, in metric units.
#[derive(Debug, Clone)]
pub struct WeatherTool {
    client: WeatherClient,
}

impl WeatherTool {
    pub fn new(client: WeatherClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn id(&self) -> ToolId {
        ToolId::WeatherData
    }

    fn description(&self) -> &'static str {
        "Calls the OpenWeather API and returns the raw current weather JSON for a city."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "City name, optionally with country code, e.g. 'London,GB'"
                }
            },
            "required": ["city"]
        })
    }

    async fn call(&self, args: &Value) -> anyhow::Result<String> {
        let city = string_arg(self.id(), args, "city")?;
        let reading = self.client.fetch(city).await?;
        Ok(reading.to_observation())
    }
}

fn string_arg<'a>(tool: ToolId, args: &'a Value, key: &str) -> Result<&'a str, AgentError> {
    args.get(key).and_then(Value::as_str).ok_or_else(|| AgentError::InvalidToolArguments {
        tool: tool.to_string(),
        reason: format!("expected string argument '{key}'"),
    })
}

/// The tools offered to the model, in registration order.
#[derive(Debug, Default)]
pub struct Toolset {
    tools: Vec<Box<dyn Tool>>,
}

impl Toolset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Box::new(tool));
        self
    }

    /// Geocoding and weather tools wired to the configured endpoints.
    pub fn from_config(config: &Config, http: Client) -> Self {
        Self::new()
            .with(GeocodeTool::new(GeocodingClient::from_config(config, http.clone())))
            .with(WeatherTool::new(WeatherClient::from_config(config, http)))
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition {
                kind: "function",
                function: FunctionDefinition {
                    name: tool.id().as_str(),
                    description: tool.description(),
                    parameters: tool.parameters(),
                },
            })
            .collect()
    }

    /// Dispatch a call by name. A name that is unknown, or not registered
    /// here, becomes an observation telling the model which tools exist.
    pub async fn call(&self, name: &str, args: &Value) -> anyhow::Result<String> {
        let registered = ToolId::try_from(name)
            .ok()
            .and_then(|id| self.tools.iter().find(|tool| tool.id() == id));

        match registered {
            Some(tool) => tool.call(args).await,
            None => {
                let names: Vec<&str> = self.tools.iter().map(|t| t.id().as_str()).collect();
                Ok(format!("{name} is not a valid tool, try one of [{}].", names.join(", ")))
            }
        }
    }
}
