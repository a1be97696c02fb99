//! Audit records for accepted service descriptions.
//!
//! Every constructed description leaves one record behind: a readable dump
//! of what the document declares, for later inspection.

use crate::config::AuditConfig;
use crate::model::{ServiceModel, SoapVersion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

/// One audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Record title
    pub title: String,
    /// Structural dump of the service model
    pub body: String,
    /// Correlation tags (always empty for service descriptions)
    pub tags: Vec<String>,
    /// Component that produced the record
    pub plugin_name: String,
    /// When the record was produced
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Build the record for a parsed model.
    pub fn for_model(model: &ServiceModel, config: &AuditConfig) -> Self {
        Self {
            title: config.title.clone(),
            body: dump_model(model),
            tags: Vec::new(),
            plugin_name: config.plugin_name.clone(),
            recorded_at: Utc::now(),
        }
    }
}

/// Destination for audit records.
///
/// Append-only. Implementations must accept concurrent appends.
pub trait AuditSink: Send + Sync {
    fn append(&self, category: &str, record: AuditRecord);
}

/// In-memory audit store.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    records: Mutex<Vec<(String, AuditRecord)>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, in append order.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.with_records(|records| records.iter().map(|(_, r)| r.clone()).collect())
    }

    /// Records appended under `category`.
    pub fn records_in(&self, category: &str) -> Vec<AuditRecord> {
        self.with_records(|records| {
            records
                .iter()
                .filter(|(c, _)| c == category)
                .map(|(_, r)| r.clone())
                .collect()
        })
    }

    pub fn len(&self) -> usize {
        self.with_records(|records| records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_records<T>(&self, f: impl FnOnce(&[(String, AuditRecord)]) -> T) -> T {
        let records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&records)
    }
}

impl AuditSink for MemoryAuditStore {
    fn append(&self, category: &str, record: AuditRecord) {
        let mut records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push((category.to_string(), record));
    }
}

/// Render a readable dump of the model.
///
/// ```text
/// Prefixes:
///      tns: urn:calc
///
/// Bindings:
///      Soap11Binding: {urn:calc}CalcBinding
///
/// Service: CalcService
///      Port: CalcPort (Soap11Binding: {urn:calc}CalcBinding)
///          Address: http://host/calc
///          Operations:
///             Add(x: xsd:int, y: xsd:int)
/// ```
pub fn dump_model(model: &ServiceModel) -> String {
    ModelDump(model).to_string()
}

struct ModelDump<'a>(&'a ServiceModel);

impl fmt::Display for ModelDump<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_dump(out, self.0)
    }
}

fn write_dump(out: &mut fmt::Formatter<'_>, model: &ServiceModel) -> fmt::Result {
    let tns = model.target_namespace.as_deref().unwrap_or_default();

    writeln!(out, "Prefixes:")?;
    for (prefix, uri) in model.prefixes.iter().filter(|(p, _)| !p.is_empty()) {
        writeln!(out, "     {}: {}", prefix, uri)?;
    }

    writeln!(out)?;
    writeln!(out, "Bindings:")?;
    for binding in model.bindings.values() {
        writeln!(
            out,
            "     {}: {}",
            binding_kind(binding.soap_version),
            qualified(tns, &binding.name)
        )?;
    }

    for service in model.services.values() {
        writeln!(out)?;
        writeln!(out, "Service: {}", service.name)?;
        for port in service.ports.values() {
            let kind = model
                .bindings
                .get(&port.binding)
                .map(|b| binding_kind(b.soap_version))
                .unwrap_or("Binding");
            writeln!(
                out,
                "     Port: {} ({}: {})",
                port.name,
                kind,
                qualified(tns, &port.binding)
            )?;
            if let Some(address) = &port.binding_address {
                writeln!(out, "         Address: {}", address)?;
            }
            writeln!(out, "         Operations:")?;
            for name in &port.operations {
                let params = model
                    .operations
                    .get(name)
                    .map(|op| {
                        op.input_params
                            .iter()
                            .map(|p| {
                                format!("{}: {}", p.name, short_type(&model.prefixes, &p.type_ref))
                            })
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_default();
                writeln!(out, "            {}({})", name, params)?;
            }
        }
    }

    Ok(())
}

fn binding_kind(version: Option<SoapVersion>) -> &'static str {
    match version {
        Some(SoapVersion::Soap11) => "Soap11Binding",
        Some(SoapVersion::Soap12) => "Soap12Binding",
        None => "HttpBinding",
    }
}

fn qualified(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{{{}}}{}", namespace, name)
    }
}

/// `xsd:int` when the namespace has a declared prefix, `{ns}int` otherwise.
fn short_type(prefixes: &BTreeMap<String, String>, (namespace, name): &(String, String)) -> String {
    if namespace.is_empty() {
        return name.clone();
    }
    prefixes
        .iter()
        .find(|(prefix, uri)| !prefix.is_empty() && *uri == namespace)
        .map(|(prefix, _)| format!("{}:{}", prefix, name))
        .unwrap_or_else(|| qualified(namespace, name))
}
