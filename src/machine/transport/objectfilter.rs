//! Simulated objectfilter camera component.
//!
//! Mirrors the remote module's configuration rules and its `DoCommand`
//! behaviour: the filter forwards camera frames to one of several configured
//! vision services, and `{"vision-service": "<name>"}` switches which one.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::machine::error::{MachineError, Result};
use crate::machine::payload::SetVisionService;

use super::sim::CommandHandler;

/// Model triplet the component registers under.
pub const OBJECTFILTER_MODEL: &str = "felixreichenbach:camera:objectfilter";

/// Component attributes as configured on the machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectFilterConfig {
    /// The camera image source
    #[serde(default)]
    pub camera: String,
    /// Vision services the filter may switch between; the first is active initially
    #[serde(default)]
    pub vision_services: Vec<String>,
    /// Labels kept by the filter
    #[serde(default)]
    pub labels: Vec<String>,
    /// Minimum detection confidence
    #[serde(default)]
    pub confidence: f64,
    /// Overlay bounding boxes instead of streaming raw frames
    #[serde(default)]
    pub display_boxes: bool,
    /// Skip data capture for frames without relevant detections
    #[serde(default)]
    pub filter_data: bool,
}

impl ObjectFilterConfig {
    /// Validate the attributes and return the implicit dependencies
    /// (every vision service, then the source camera).
    pub fn validate(&self, path: &str) -> Result<Vec<String>> {
        if self.camera.is_empty() {
            return Err(MachineError::InvalidConfig(format!(
                "{}: \"camera\" is required",
                path
            )));
        }
        if self.vision_services.is_empty() {
            return Err(MachineError::InvalidConfig(format!(
                "{}: \"vision_services\" is required",
                path
            )));
        }

        let mut deps = self.vision_services.clone();
        deps.push(self.camera.clone());
        Ok(deps)
    }
}

/// Running objectfilter instance holding the active vision service.
#[derive(Debug)]
pub struct ObjectFilterComponent {
    config: ObjectFilterConfig,
    active: RwLock<String>,
}

impl ObjectFilterComponent {
    pub fn new(config: ObjectFilterConfig) -> Result<Self> {
        config.validate("objectfilter")?;
        let active = config.vision_services[0].clone();
        Ok(Self {
            config,
            active: RwLock::new(active),
        })
    }

    /// Name of the vision service frames are currently sent to.
    pub fn active_vision_service(&self) -> String {
        self.active
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl CommandHandler for ObjectFilterComponent {
    fn handle(&self, command: &Map<String, Value>) -> Result<Map<String, Value>> {
        let name = match command.get(SetVisionService::KEY) {
            Some(Value::String(name)) => name,
            Some(other) => {
                return Err(MachineError::InvalidPayload(format!(
                    "vision service could not be changed to: {}",
                    other
                )));
            }
            None => {
                return Err(MachineError::InvalidPayload(format!(
                    "vision service could not be changed: missing \"{}\"",
                    SetVisionService::KEY
                )));
            }
        };

        if !self.config.vision_services.contains(name) {
            return Err(MachineError::InvalidPayload(format!(
                "vision service \"{}\" is not in the object filter's vision_services list",
                name
            )));
        }

        *self
            .active
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = name.clone();
        info!("Vision service changed to: {}", name);

        let mut reply = Map::new();
        reply.insert(
            SetVisionService::KEY.to_string(),
            Value::String(name.clone()),
        );
        reply.insert("status".to_string(), Value::String("applied".to_string()));
        Ok(reply)
    }
}
