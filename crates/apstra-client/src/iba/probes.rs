//! IBA probes and the predefined probe catalog

use crate::blueprint::blueprint_path;
use crate::client::ApstraClient;
use crate::common::query::{Labeled, list_items, list_polished, one_by_label};
use crate::common::{IdResponse, ObjectId};
use crate::error::ApstraError;
use crate::iba::iba_path;
use crate::polish::{Polish, unknown_value};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Entry of the predefined probe catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredefinedProbe {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub experimental: bool,
    /// JSON schema of the instantiation parameters
    #[serde(default)]
    pub schema: Value,
}

impl PredefinedProbe {
    /// Parameter names the schema marks as required
    pub fn required_params(&self) -> Vec<&str> {
        self.schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

impl Labeled for PredefinedProbe {
    fn label(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Created,
    Configuring,
    Operational,
    Error,
}

impl ProbeState {
    fn parse(s: &str) -> Result<Self, ApstraError> {
        match s {
            "created" => Ok(Self::Created),
            "configuring" => Ok(Self::Configuring),
            "operational" => Ok(Self::Operational),
            "error" => Ok(Self::Error),
            other => Err(unknown_value("probe state", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawProbe {
    pub id: ObjectId,
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub state: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub predefined_probe: Option<String>,
    #[serde(default)]
    pub anomaly_count: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub stages: Vec<Value>,
    #[serde(default)]
    pub processors: Vec<Value>,
    #[serde(default)]
    pub last_error: Option<Value>,
}

/// Output stage of a probe; the full definition is kept as sent
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeStage {
    pub name: String,
    pub definition: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeProcessor {
    pub name: String,
    pub processor_type: String,
    pub definition: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    pub id: ObjectId,
    pub label: String,
    pub description: String,
    pub state: ProbeState,
    pub disabled: bool,
    pub predefined_probe: Option<String>,
    pub anomaly_count: u64,
    pub tags: Vec<String>,
    pub stages: Vec<ProbeStage>,
    pub processors: Vec<ProbeProcessor>,
    pub last_error: Option<Value>,
}

impl Probe {
    pub fn stage(&self, name: &str) -> Option<&ProbeStage> {
        self.stages.iter().find(|s| s.name == name)
    }
}

fn required_str(probe: &str, kind: &str, field: &str, value: &Value) -> Result<String, ApstraError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApstraError::Polish(format!("probe '{}' has a {} without '{}'", probe, kind, field)))
}

impl Polish for RawProbe {
    type Polished = Probe;

    fn polish(self) -> Result<Probe, ApstraError> {
        let stages = self
            .stages
            .into_iter()
            .map(|definition| {
                Ok(ProbeStage {
                    name: required_str(&self.label, "stage", "name", &definition)?,
                    definition,
                })
            })
            .collect::<Result<Vec<_>, ApstraError>>()?;
        let processors = self
            .processors
            .into_iter()
            .map(|definition| {
                Ok(ProbeProcessor {
                    name: required_str(&self.label, "processor", "name", &definition)?,
                    processor_type: required_str(&self.label, "processor", "type", &definition)?,
                    definition,
                })
            })
            .collect::<Result<Vec<_>, ApstraError>>()?;

        Ok(Probe {
            state: ProbeState::parse(&self.state)?,
            id: self.id,
            label: self.label,
            description: self.description,
            disabled: self.disabled,
            predefined_probe: self.predefined_probe,
            anomaly_count: self.anomaly_count,
            tags: self.tags,
            stages,
            processors,
            last_error: self.last_error.filter(|e| !e.is_null()),
        })
    }
}

impl Labeled for Probe {
    fn label(&self) -> &str {
        &self.label
    }
}

fn probes_path(blueprint_id: &ObjectId) -> String {
    blueprint_path(blueprint_id, "/probes")
}

impl ApstraClient {
    pub async fn list_predefined_probes(&self, blueprint_id: &ObjectId) -> Result<Vec<PredefinedProbe>, ApstraError> {
        list_items(&self.http, &iba_path(blueprint_id, "/predefined-probes")).await
    }

    pub async fn get_predefined_probe(
        &self,
        blueprint_id: &ObjectId,
        name: &str,
    ) -> Result<PredefinedProbe, ApstraError> {
        one_by_label(self.list_predefined_probes(blueprint_id).await?, name, "predefined probe")
    }

    /// Instantiate a catalog probe with the given parameters
    pub async fn instantiate_predefined_probe(
        &self,
        blueprint_id: &ObjectId,
        name: &str,
        params: &Value,
    ) -> Result<ObjectId, ApstraError> {
        if !params.is_object() {
            return Err(ApstraError::InvalidRequest(format!(
                "parameters for predefined probe '{}' must be a JSON object",
                name
            )));
        }
        let path = iba_path(blueprint_id, &format!("/predefined-probes/{}", urlencoding::encode(name)));
        let response: IdResponse = self.http.post(&path, params).await?;
        info!("Instantiated predefined probe '{}' as {}", name, response.id);
        Ok(response.id)
    }

    pub async fn list_probes(&self, blueprint_id: &ObjectId) -> Result<Vec<Probe>, ApstraError> {
        list_polished::<RawProbe>(&self.http, &probes_path(blueprint_id)).await
    }

    pub async fn get_probe(&self, blueprint_id: &ObjectId, id: &ObjectId) -> Result<Probe, ApstraError> {
        let raw: RawProbe = self.http.get(&format!("{}/{}", probes_path(blueprint_id), id)).await?;
        raw.polish()
    }

    pub async fn get_probe_by_label(&self, blueprint_id: &ObjectId, label: &str) -> Result<Probe, ApstraError> {
        one_by_label(self.list_probes(blueprint_id).await?, label, "probe")
    }

    pub async fn delete_probe(&self, blueprint_id: &ObjectId, id: &ObjectId) -> Result<(), ApstraError> {
        self.http.delete(&format!("{}/{}", probes_path(blueprint_id), id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::client_with_version;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn probe_json(id: &str, label: &str) -> Value {
        json!({
            "id": id,
            "label": label,
            "description": "BGP session monitoring",
            "state": "operational",
            "disabled": false,
            "predefined_probe": "bgp_session",
            "anomaly_count": 2,
            "tags": ["bgp"],
            "stages": [
                {"name": "BGP Session", "type": "table", "units": {}},
                {"name": "BGP Session Down", "type": "table"}
            ],
            "processors": [
                {"name": "BGP Session", "type": "bgp_session", "inputs": {}, "outputs": {"out": "BGP Session"}}
            ],
            "last_error": null
        })
    }

    #[test]
    fn test_polish_probe() {
        let raw: RawProbe = serde_json::from_value(probe_json("p1", "BGP")).unwrap();
        let probe = raw.polish().unwrap();
        assert_eq!(probe.state, ProbeState::Operational);
        assert_eq!(probe.anomaly_count, 2);
        assert!(probe.stage("BGP Session Down").is_some());
        assert_eq!(probe.processors[0].processor_type, "bgp_session");
        assert!(probe.last_error.is_none());
    }

    #[test]
    fn test_polish_probe_stage_without_name() {
        let mut value = probe_json("p1", "BGP");
        value["stages"] = json!([{"type": "table"}]);
        let raw: RawProbe = serde_json::from_value(value).unwrap();
        assert!(matches!(raw.polish(), Err(ApstraError::Polish(_))));
    }

    #[tokio::test]
    async fn test_instantiate_predefined_probe() {
        let (server, client) = client_with_version("4.2.0").await;
        Mock::given(method("GET"))
            .and(path("/api/blueprints/bp1/iba/predefined-probes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "name": "bgp_session",
                    "description": "BGP sessions",
                    "schema": {"type": "object", "properties": {"label": {"type": "string"}}, "required": ["label"]}
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/blueprints/bp1/iba/predefined-probes/bgp_session"))
            .and(body_json(json!({"label": "BGP"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "probe-1"})))
            .mount(&server)
            .await;

        let bp = ObjectId::from("bp1");
        let catalog = client.get_predefined_probe(&bp, "bgp_session").await.unwrap();
        assert_eq!(catalog.required_params(), vec!["label"]);

        let id = client
            .instantiate_predefined_probe(&bp, "bgp_session", &json!({"label": "BGP"}))
            .await
            .unwrap();
        assert_eq!(id.as_str(), "probe-1");

        let err = client
            .instantiate_predefined_probe(&bp, "bgp_session", &json!(["label"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ApstraError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_get_probe_by_label() {
        let (server, client) = client_with_version("4.2.0").await;
        Mock::given(method("GET"))
            .and(path("/api/blueprints/bp1/probes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [probe_json("p1", "BGP"), probe_json("p2", "BGP"), probe_json("p3", "Fans")]
            })))
            .mount(&server)
            .await;

        let bp = ObjectId::from("bp1");
        assert_eq!(client.get_probe_by_label(&bp, "Fans").await.unwrap().id.as_str(), "p3");
        assert!(matches!(
            client.get_probe_by_label(&bp, "BGP").await,
            Err(ApstraError::MultipleMatch(_))
        ));
    }
}
