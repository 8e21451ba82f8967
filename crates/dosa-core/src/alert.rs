//! Alert routing to external sinks.
//!
//! Each category maps to a list of sink identifiers from configuration. A
//! category with no identifiers, or no `alerts` section at all, means the
//! alert is silently dropped.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::DeliveryError;
use crate::protocol::LogLevel;
use crate::transport::{net_log_best_effort, PacketTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertCategory {
    Security,
    Network,
}

impl AlertCategory {
    pub const ALL: [AlertCategory; 2] = [AlertCategory::Security, AlertCategory::Network];

    /// Key used under the `alerts` configuration section.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::Security => "Security",
            AlertCategory::Network => "Network",
        }
    }
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    pub category: AlertCategory,
    pub device: String,
    pub message: String,
    pub severity: String,
    pub tags: BTreeMap<String, String>,
}

impl AlertEvent {
    pub fn new(
        category: AlertCategory,
        device: impl Into<String>,
        message: impl Into<String>,
        severity: impl Into<String>,
    ) -> Self {
        Self {
            category,
            device: device.into(),
            message: message.into(),
            severity: severity.into(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Caller tags plus the `device`, `category` and `level` attributes.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = self.tags.clone();
        attrs.insert("device".to_string(), self.device.clone());
        attrs.insert("category".to_string(), self.category.to_string());
        attrs.insert("level".to_string(), self.severity.clone());
        attrs
    }
}

/// Client for an external notification provider.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn publish(
        &self,
        target: &str,
        message: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<(), DeliveryError>;
}

/// Sink that only writes alerts to the local log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn publish(
        &self,
        target: &str,
        message: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<(), DeliveryError> {
        warn!(target_id = target, ?attributes, "ALERT: {}", message);
        Ok(())
    }
}

/// Sink identifiers per category. `None` means alerting is disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertRoutes {
    routes: Option<HashMap<AlertCategory, Vec<String>>>,
}

impl AlertRoutes {
    pub fn disabled() -> Self {
        Self { routes: None }
    }

    pub fn new(routes: HashMap<AlertCategory, Vec<String>>) -> Self {
        Self {
            routes: Some(routes),
        }
    }

    /// Read `alerts.<Category>` lists from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        if !settings.contains(&["alerts"]) {
            return Self::disabled();
        }

        let routes = AlertCategory::ALL
            .into_iter()
            .map(|category| {
                let sinks: Vec<String> = settings.get(&["alerts", category.as_str()], Vec::new());
                (category, sinks)
            })
            .filter(|(_, sinks)| !sinks.is_empty())
            .collect();

        Self::new(routes)
    }

    pub fn is_enabled(&self) -> bool {
        self.routes.is_some()
    }

    pub fn sinks_for(&self, category: AlertCategory) -> &[String] {
        self.routes
            .as_ref()
            .and_then(|routes| routes.get(&category))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

impl DispatchSummary {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

pub struct AlertDispatcher {
    routes: AlertRoutes,
    sink: Box<dyn AlertSink>,
}

impl AlertDispatcher {
    pub fn new(routes: AlertRoutes, sink: Box<dyn AlertSink>) -> Self {
        Self { routes, sink }
    }

    pub fn routes(&self) -> &AlertRoutes {
        &self.routes
    }

    /// Deliver `event` to every sink configured for its category.
    ///
    /// Failures are logged per sink and never stop the remaining sinks.
    pub async fn dispatch(&self, event: &AlertEvent) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let sinks = self.routes.sinks_for(event.category);

        if sinks.is_empty() {
            debug!(category = %event.category, device = %event.device, "No alert sinks configured");
            return summary;
        }

        let attributes = event.attributes();

        for target in sinks {
            match self.sink.publish(target, &event.message, &attributes).await {
                Ok(()) => {
                    info!(category = %event.category, target = %target, "Alert dispatched");
                    summary.delivered.push(target.clone());
                }
                Err(e) => {
                    error!(
                        category = %event.category,
                        device = %event.device,
                        error = %e,
                        "Alert delivery failed"
                    );
                    summary.failed.push(target.clone());
                }
            }
        }

        summary
    }
}

/// Dispatch `event` and report each sink's outcome on the network log.
pub async fn dispatch_and_report<T>(
    dispatcher: &AlertDispatcher,
    transport: &T,
    event: &AlertEvent,
) -> DispatchSummary
where
    T: PacketTransport + ?Sized,
{
    let summary = dispatcher.dispatch(event).await;

    for target in &summary.delivered {
        let text = format!("{} alert dispatched to {}", event.category, target);
        net_log_best_effort(transport, LogLevel::Warning, &text).await;
    }
    if !summary.failed.is_empty() {
        let text = format!("Failed to send alert for device {}", event.device);
        net_log_best_effort(transport, LogLevel::Error, &text).await;
    }

    summary
}
