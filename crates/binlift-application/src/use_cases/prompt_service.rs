//! Prompt manager.
//!
//! # Overview
//! Holds versioned prompt templates per operation type, renders them with
//! handlebars in strict mode (a missing placeholder is a render error, never
//! silently empty), applies per-provider adaptations, and records
//! per `(template, provider)` effectiveness metrics after each completed
//! translation. The manager records; it never influences selection.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use binlift_domain::entities::{
    OperationType, PromptParams, PromptTemplate, RenderedPrompt,
};
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::PromptMetricsRepository;
use handlebars::Handlebars;
use tracing::debug;

/// Versioned templates and their compiled forms.
pub struct PromptManager {
    handlebars: RwLock<Handlebars<'static>>,
    templates: RwLock<HashMap<OperationType, BTreeMap<u32, PromptTemplate>>>,
    metrics: Arc<dyn PromptMetricsRepository>,
}

impl PromptManager {
    /// Create a manager pre-loaded with the built-in v1 templates.
    pub fn new(metrics: Arc<dyn PromptMetricsRepository>) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        let manager = Self {
            handlebars: RwLock::new(handlebars),
            templates: RwLock::new(HashMap::new()),
            metrics,
        };
        for template in builtin_templates() {
            manager.register(template)?;
        }
        Ok(manager)
    }

    /// Register a template version. Versions are immutable: re-registering
    /// an existing `(operation, version)` is rejected.
    pub fn register(&self, template: PromptTemplate) -> Result<()> {
        let mut templates = self.write_templates()?;
        let versions = templates.entry(template.operation_type).or_default();
        if versions.contains_key(&template.version) {
            return Err(Error::invalid_argument(format!(
                "template {} v{} already registered",
                template.template_id, template.version
            )));
        }
        self.write_handlebars()?
            .register_template_string(
                &compiled_name(&template.template_id, template.version),
                &template.user_prompt_template,
            )
            .map_err(|e| {
                Error::prompt_render(format!(
                    "template {} v{} does not compile: {e}",
                    template.template_id, template.version
                ))
            })?;
        debug!(
            template_id = %template.template_id,
            version = template.version,
            "prompt template registered"
        );
        versions.insert(template.version, template);
        Ok(())
    }

    /// Resolve the template for `operation`: the latest version, unless
    /// `pinned_version` selects an older one.
    pub fn resolve(
        &self,
        operation: OperationType,
        pinned_version: Option<u32>,
    ) -> Result<PromptTemplate> {
        let templates = self.read_templates()?;
        let versions = templates
            .get(&operation)
            .ok_or_else(|| Error::not_found(format!("template for {operation}")))?;
        let template = match pinned_version {
            Some(version) => versions.get(&version).ok_or_else(|| {
                Error::not_found(format!("template for {operation} v{version}"))
            })?,
            None => versions
                .last_key_value()
                .map(|(_, t)| t)
                .ok_or_else(|| Error::not_found(format!("template for {operation}")))?,
        };
        Ok(template.clone())
    }

    /// Render the prompt for `operation` against `context`, adapted for
    /// `provider_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PromptRender`] when the context is missing a
    /// placeholder the template names.
    pub fn render(
        &self,
        operation: OperationType,
        provider_id: &str,
        context: &serde_json::Value,
        pinned_version: Option<u32>,
    ) -> Result<RenderedPrompt> {
        let template = self.resolve(operation, pinned_version)?;
        let user = self
            .read_handlebars()?
            .render(&compiled_name(&template.template_id, template.version), context)
            .map_err(|e| {
                Error::prompt_render(format!(
                    "render {} v{}: {e}",
                    template.template_id, template.version
                ))
            })?;

        let mut system = template.system_prompt.clone();
        let mut user = user;
        let mut params = template.default_params.clone();
        if let Some(adaptation) = template.provider_adaptations.get(provider_id) {
            if let Some(append) = &adaptation.system_append {
                system.push_str("\n\n");
                system.push_str(append);
            }
            if let Some(append) = &adaptation.user_append {
                user.push_str("\n\n");
                user.push_str(append);
            }
            if let Some(temperature) = adaptation.temperature {
                params.temperature = temperature;
            }
        }

        Ok(RenderedPrompt {
            template_id: template.template_id,
            version: template.version,
            system,
            user,
            params,
        })
    }

    /// Fold one translation outcome into the metrics store.
    pub async fn record_outcome(
        &self,
        template_id: &str,
        provider_id: &str,
        success: bool,
        quality: Option<f64>,
        latency_ms: u64,
    ) -> Result<()> {
        self.metrics
            .record(template_id, provider_id, success, quality, latency_ms)
            .await
    }

    fn read_templates(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<OperationType, BTreeMap<u32, PromptTemplate>>>>
    {
        self.templates
            .read()
            .map_err(|_| Error::internal("template store lock poisoned"))
    }

    fn write_templates(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<OperationType, BTreeMap<u32, PromptTemplate>>>>
    {
        self.templates
            .write()
            .map_err(|_| Error::internal("template store lock poisoned"))
    }

    fn read_handlebars(&self) -> Result<std::sync::RwLockReadGuard<'_, Handlebars<'static>>> {
        self.handlebars
            .read()
            .map_err(|_| Error::internal("template registry lock poisoned"))
    }

    fn write_handlebars(&self) -> Result<std::sync::RwLockWriteGuard<'_, Handlebars<'static>>> {
        self.handlebars
            .write()
            .map_err(|_| Error::internal("template registry lock poisoned"))
    }
}

fn compiled_name(template_id: &str, version: u32) -> String {
    format!("{template_id}.v{version}")
}

/// The v1 templates the service ships with.
fn builtin_templates() -> Vec<PromptTemplate> {
    vec![
        PromptTemplate {
            template_id: "function_translation.default".to_owned(),
            version: 1,
            operation_type: OperationType::FunctionTranslation,
            system_prompt: "You are a reverse engineer who explains disassembled functions \
                            to software engineers. Describe behaviour, inputs, outputs and \
                            side effects in plain language. Do not speculate beyond the \
                            assembly shown, and never invent function behaviour."
                .to_owned(),
            user_prompt_template: "Explain the function `{{name}}` at {{address}} \
                                   ({{size}} bytes) at a {{detail_level}} level of detail.\n\
                                   It calls: {{calls_to}}\nIt is called by: {{called_by}}\n\n\
                                   Assembly:\n```\n{{{assembly}}}\n```"
                .to_owned(),
            provider_adaptations: HashMap::new(),
            default_params: PromptParams {
                temperature: 0.2,
                max_tokens: 1024,
            },
        },
        PromptTemplate {
            template_id: "import_explanation.default".to_owned(),
            version: 1,
            operation_type: OperationType::ImportExplanation,
            system_prompt: "You are a reverse engineer who explains what a binary's \
                            imported APIs reveal about its capabilities."
                .to_owned(),
            user_prompt_template: "The binary imports these symbols from `{{library}}`:\n\
                                   {{symbols}}\n\nExplain what this library is and what \
                                   using these specific symbols suggests the program does."
                .to_owned(),
            provider_adaptations: HashMap::new(),
            default_params: PromptParams {
                temperature: 0.2,
                max_tokens: 512,
            },
        },
        PromptTemplate {
            template_id: "overall_summary.default".to_owned(),
            version: 1,
            operation_type: OperationType::OverallSummary,
            system_prompt: "You are a reverse engineer writing an executive summary of a \
                            binary for a security review."
                .to_owned(),
            user_prompt_template: "Summarize a {{format}} binary for {{architecture}} on \
                                   {{platform}}: {{function_count}} functions, \
                                   {{import_count}} imports, {{string_count}} strings.\n\
                                   Key functions:\n{{{function_overview}}}\n\nNotable \
                                   strings:\n{{{string_overview}}}"
                .to_owned(),
            provider_adaptations: HashMap::new(),
            default_params: PromptParams {
                temperature: 0.3,
                max_tokens: 1024,
            },
        },
    ]
}
