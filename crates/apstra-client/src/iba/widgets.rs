//! IBA dashboard widgets (`/api/blueprints/{id}/iba/widgets`)

use crate::client::ApstraClient;
use crate::common::query::{Labeled, list_polished, one_by_label};
use crate::common::{IdResponse, ObjectId};
use crate::error::ApstraError;
use crate::iba::iba_path;
use crate::polish::{Polish, parse_optional_timestamp, unknown_value};
use crate::version::IBA_WIDGETS;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetType {
    Stage,
    AnomalyHeatmap,
}

impl WidgetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stage => "stage",
            Self::AnomalyHeatmap => "anomaly_heatmap",
        }
    }

    fn parse(s: &str) -> Result<Self, ApstraError> {
        match s {
            "stage" => Ok(Self::Stage),
            "anomaly_heatmap" => Ok(Self::AnomalyHeatmap),
            other => Err(unknown_value("widget type", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawWidget {
    pub id: ObjectId,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub widget_type: String,
    #[serde(default)]
    pub probe_id: Option<ObjectId>,
    #[serde(default)]
    pub stage_name: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub id: ObjectId,
    pub label: String,
    pub description: String,
    pub widget_type: WidgetType,
    pub probe_id: Option<ObjectId>,
    pub stage_name: Option<String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Polish for RawWidget {
    type Polished = Widget;

    fn polish(self) -> Result<Widget, ApstraError> {
        let widget_type = WidgetType::parse(&self.widget_type)?;
        if widget_type == WidgetType::Stage && (self.probe_id.is_none() || self.stage_name.is_none()) {
            return Err(ApstraError::Polish(format!(
                "stage widget '{}' lacks probe_id or stage_name",
                self.label
            )));
        }
        Ok(Widget {
            widget_type,
            created_at: parse_optional_timestamp("created_at", self.created_at.as_deref())?,
            updated_at: parse_optional_timestamp("updated_at", self.updated_at.as_deref())?,
            id: self.id,
            label: self.label,
            description: self.description,
            probe_id: self.probe_id,
            stage_name: self.stage_name,
            created_by: self.created_by,
            updated_by: self.updated_by,
        })
    }
}

impl Labeled for Widget {
    fn label(&self) -> &str {
        &self.label
    }
}

/// New widget showing one stage of a probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageWidgetRequest {
    pub label: String,
    pub description: String,
    pub probe_id: ObjectId,
    pub stage_name: String,
}

#[derive(Debug, Serialize)]
struct RawStageWidgetRequest<'a> {
    #[serde(rename = "type")]
    widget_type: &'static str,
    #[serde(flatten)]
    request: &'a StageWidgetRequest,
}

fn widgets_path(blueprint_id: &ObjectId) -> String {
    iba_path(blueprint_id, "/widgets")
}

impl ApstraClient {
    pub async fn list_widgets(&self, blueprint_id: &ObjectId) -> Result<Vec<Widget>, ApstraError> {
        self.ensure_feature(&IBA_WIDGETS).await?;
        list_polished::<RawWidget>(&self.http, &widgets_path(blueprint_id)).await
    }

    pub async fn get_widget(&self, blueprint_id: &ObjectId, id: &ObjectId) -> Result<Widget, ApstraError> {
        self.ensure_feature(&IBA_WIDGETS).await?;
        let raw: RawWidget = self.http.get(&format!("{}/{}", widgets_path(blueprint_id), id)).await?;
        raw.polish()
    }

    pub async fn get_widget_by_label(&self, blueprint_id: &ObjectId, label: &str) -> Result<Widget, ApstraError> {
        one_by_label(self.list_widgets(blueprint_id).await?, label, "widget")
    }

    /// Create a stage widget; the probe must already expose `stage_name`
    pub async fn create_stage_widget(
        &self,
        blueprint_id: &ObjectId,
        request: &StageWidgetRequest,
    ) -> Result<ObjectId, ApstraError> {
        self.ensure_feature(&IBA_WIDGETS).await?;
        let probe = self.get_probe(blueprint_id, &request.probe_id).await?;
        if probe.stage(&request.stage_name).is_none() {
            return Err(ApstraError::InvalidRequest(format!(
                "probe '{}' has no stage '{}'",
                probe.label, request.stage_name
            )));
        }

        let body = RawStageWidgetRequest {
            widget_type: WidgetType::Stage.as_str(),
            request,
        };
        let response: IdResponse = self.http.post(&widgets_path(blueprint_id), &body).await?;
        Ok(response.id)
    }

    pub async fn delete_widget(&self, blueprint_id: &ObjectId, id: &ObjectId) -> Result<(), ApstraError> {
        self.ensure_feature(&IBA_WIDGETS).await?;
        self.http.delete(&format!("{}/{}", widgets_path(blueprint_id), id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::client_with_version;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn widget_json(id: &str, label: &str) -> serde_json::Value {
        json!({
            "id": id,
            "label": label,
            "description": "",
            "type": "stage",
            "probe_id": "p1",
            "stage_name": "BGP Session Down",
            "created_by": "admin",
            "updated_by": "admin",
            "created_at": "2024-05-01T12:00:00.000000Z",
            "updated_at": null
        })
    }

    async fn mount_probe(server: &wiremock::MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/blueprints/bp1/probes/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p1",
                "label": "BGP",
                "state": "operational",
                "stages": [{"name": "BGP Session Down"}]
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_polish_widget() {
        let raw: RawWidget = serde_json::from_value(widget_json("w1", "bgp down")).unwrap();
        let widget = raw.polish().unwrap();
        assert_eq!(widget.widget_type, WidgetType::Stage);
        assert!(widget.created_at.is_some());
        assert!(widget.updated_at.is_none());
    }

    #[test]
    fn test_polish_stage_widget_needs_probe() {
        let mut value = widget_json("w1", "bgp down");
        value["probe_id"] = json!(null);
        let raw: RawWidget = serde_json::from_value(value).unwrap();
        assert!(matches!(raw.polish(), Err(ApstraError::Polish(_))));
    }

    #[tokio::test]
    async fn test_create_stage_widget() {
        let (server, client) = client_with_version("4.1.2").await;
        mount_probe(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/blueprints/bp1/iba/widgets"))
            .and(body_json(json!({
                "type": "stage",
                "label": "bgp down",
                "description": "",
                "probe_id": "p1",
                "stage_name": "BGP Session Down"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "w-new"})))
            .mount(&server)
            .await;

        let mut request = StageWidgetRequest {
            label: "bgp down".to_string(),
            description: String::new(),
            probe_id: ObjectId::from("p1"),
            stage_name: "BGP Session Down".to_string(),
        };
        let bp = ObjectId::from("bp1");
        assert_eq!(client.create_stage_widget(&bp, &request).await.unwrap().as_str(), "w-new");

        request.stage_name = "Nope".to_string();
        assert!(matches!(
            client.create_stage_widget(&bp, &request).await,
            Err(ApstraError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_widgets_need_supported_version() {
        let (_server, client) = client_with_version("4.0.2").await;
        let err = client.list_widgets(&ObjectId::from("bp1")).await.unwrap_err();
        assert!(matches!(err, ApstraError::UnsupportedVersion(_)));
    }
}
