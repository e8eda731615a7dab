//! Agent definition and construction.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use schemars::JsonSchema;
use serde_json::Value;

use crate::config::ConfigError;
use crate::guardrails::Guardrail;
use crate::handoff::{
    TRANSFER_PREFIX, is_transfer_call, normalize_agent_name, transfer_tool_definition,
    transfer_tool_name,
};
use crate::model::{GenerationSettings, Model};
use crate::tokens::{Tokenizer, default_tokenizer};
use crate::tools::{RunContext, Tool, ToolRegistry};
use crate::types::{ToolDefinition, ToolExecutionResult};

pub type DynamicInstructions = Arc<dyn Fn(&RunContext) -> String + Send + Sync>;

/// Custom completion check: `(context, this turn's tool results) -> done`.
pub type ShouldFinish = Arc<dyn Fn(&RunContext, &[ToolExecutionResult]) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum Instructions {
    Static(String),
    /// Re-evaluated every turn.
    Dynamic(DynamicInstructions),
}

impl Instructions {
    pub fn resolve(&self, context: &RunContext) -> Cow<'_, str> {
        match self {
            Self::Static(text) => Cow::Borrowed(text),
            Self::Dynamic(f) => Cow::Owned(f(context)),
        }
    }
}

impl Default for Instructions {
    fn default() -> Self {
        Self::Static(String::new())
    }
}

impl From<&str> for Instructions {
    fn from(text: &str) -> Self {
        Self::Static(text.to_string())
    }
}

impl From<String> for Instructions {
    fn from(text: String) -> Self {
        Self::Static(text)
    }
}

/// A configured unit of instructions, model, tools and sub-agents.
///
/// Immutable during a run. Sub-agents may be rewired between runs with
/// [`Agent::set_subagents`], which is how cyclic topologies (A to B to A)
/// are built.
pub struct Agent {
    name: String,
    handoff_description: Option<String>,
    instructions: Instructions,
    model: Arc<dyn Model>,
    tools: ToolRegistry,
    subagents: RwLock<Vec<Arc<Agent>>>,
    guardrails: Vec<Arc<dyn Guardrail>>,
    output_schema: Option<Value>,
    settings: GenerationSettings,
    should_finish: Option<ShouldFinish>,
    tokenizer: Tokenizer,
}

impl Agent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handoff_description(&self) -> Option<&str> {
        self.handoff_description.as_deref()
    }

    pub fn instructions(&self, context: &RunContext) -> Cow<'_, str> {
        self.instructions.resolve(context)
    }

    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn guardrails(&self) -> &[Arc<dyn Guardrail>] {
        &self.guardrails
    }

    pub fn output_schema(&self) -> Option<&Value> {
        self.output_schema.as_ref()
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn max_steps(&self) -> Option<u32> {
        self.settings.max_steps
    }

    pub fn should_finish(&self) -> Option<&ShouldFinish> {
        self.should_finish.as_ref()
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn subagents(&self) -> Vec<Arc<Agent>> {
        self.subagents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the sub-agent list. Must not be called while a run using
    /// this agent is in progress.
    ///
    /// Sub-agents are held by strong reference. A cycle built this way
    /// (A to B to A) keeps every agent in it alive until one link is
    /// cleared, e.g. with `set_subagents(Vec::new())`.
    pub fn set_subagents(&self, subagents: Vec<Arc<Agent>>) -> crate::Result<()> {
        validate_transfer_names(&subagents)?;
        *self.subagents.write().unwrap_or_else(|e| e.into_inner()) = subagents;
        Ok(())
    }

    pub fn add_subagent(&self, subagent: Arc<Agent>) -> crate::Result<()> {
        let mut subagents = self.subagents();
        subagents.push(subagent);
        self.set_subagents(subagents)
    }

    /// One reserved transfer tool per sub-agent, in declaration order.
    pub fn transfer_definitions(&self) -> Vec<ToolDefinition> {
        self.subagents()
            .iter()
            .map(|agent| transfer_tool_definition(agent))
            .collect()
    }

    /// Breadth-first search of the agent graph rooted at `self`.
    pub fn find(self: &Arc<Self>, name: &str) -> Option<Arc<Agent>> {
        let mut queue = VecDeque::from([Arc::clone(self)]);
        let mut visited = HashSet::new();

        while let Some(agent) = queue.pop_front() {
            if !visited.insert(Arc::as_ptr(&agent)) {
                continue;
            }
            if agent.name == name {
                return Some(agent);
            }
            queue.extend(agent.subagents());
        }
        None
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subagents: Vec<String> = self.subagents().iter().map(|a| a.name.clone()).collect();
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model.name())
            .field("tools", &self.tools.names())
            .field("subagents", &subagents)
            .field("guardrails", &self.guardrails.len())
            .finish()
    }
}

/// Transfer targets are resolved by normalized name, so two sub-agents
/// whose names normalize the same would make one of them unreachable.
fn validate_transfer_names(subagents: &[Arc<Agent>]) -> Result<(), ConfigError> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for agent in subagents {
        if let Some(previous) = seen.insert(normalize_agent_name(agent.name()), agent.name()) {
            return Err(ConfigError::invalid(
                "subagents",
                format!(
                    "'{}' and '{}' both resolve to {}; rename one of them",
                    previous,
                    agent.name(),
                    transfer_tool_name(agent.name())
                ),
            ));
        }
    }
    Ok(())
}

fn validate_tool_names(tools: &ToolRegistry) -> Result<(), ConfigError> {
    match tools.names().into_iter().find(|name| is_transfer_call(name)) {
        Some(name) => Err(ConfigError::invalid(
            format!("tool '{}'", name),
            format!("the '{}' prefix is reserved for sub-agent transfers", TRANSFER_PREFIX),
        )),
        None => Ok(()),
    }
}

pub struct AgentBuilder {
    name: String,
    handoff_description: Option<String>,
    instructions: Instructions,
    model: Option<Arc<dyn Model>>,
    tools: Vec<Arc<dyn Tool>>,
    subagents: Vec<Arc<Agent>>,
    guardrails: Vec<Arc<dyn Guardrail>>,
    output_schema: Option<Value>,
    settings: GenerationSettings,
    should_finish: Option<ShouldFinish>,
    tokenizer: Option<Tokenizer>,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handoff_description: None,
            instructions: Instructions::default(),
            model: None,
            tools: Vec::new(),
            subagents: Vec::new(),
            guardrails: Vec::new(),
            output_schema: None,
            settings: GenerationSettings::default(),
            should_finish: None,
            tokenizer: None,
        }
    }

    pub fn instructions(mut self, instructions: impl Into<Instructions>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn dynamic_instructions<F>(mut self, f: F) -> Self
    where
        F: Fn(&RunContext) -> String + Send + Sync + 'static,
    {
        self.instructions = Instructions::Dynamic(Arc::new(f));
        self
    }

    /// Shown in the transfer tool other agents use to reach this one.
    pub fn handoff_description(mut self, description: impl Into<String>) -> Self {
        self.handoff_description = Some(description.into());
        self
    }

    pub fn model(mut self, model: Arc<dyn Model>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn tool_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn subagent(mut self, agent: Arc<Agent>) -> Self {
        self.subagents.push(agent);
        self
    }

    pub fn guardrail(mut self, guardrail: impl Guardrail + 'static) -> Self {
        self.guardrails.push(Arc::new(guardrail));
        self
    }

    pub fn guardrail_arc(mut self, guardrail: Arc<dyn Guardrail>) -> Self {
        self.guardrails.push(guardrail);
        self
    }

    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn output_type<T: JsonSchema>(mut self) -> Self {
        self.output_schema = serde_json::to_value(schemars::schema_for!(T)).ok();
        self
    }

    pub fn settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn max_steps(mut self, max_steps: u32) -> Self {
        self.settings.max_steps = Some(max_steps);
        self
    }

    pub fn should_finish<F>(mut self, f: F) -> Self
    where
        F: Fn(&RunContext, &[ToolExecutionResult]) -> bool + Send + Sync + 'static,
    {
        self.should_finish = Some(Arc::new(f));
        self
    }

    pub fn tokenizer<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> u64 + Send + Sync + 'static,
    {
        self.tokenizer = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> crate::Result<Agent> {
        let model = self.model.ok_or(ConfigError::Missing { field: "model" })?;

        let mut tools = ToolRegistry::new();
        for tool in self.tools {
            if let Err(rejected) = tools.register(tool) {
                return Err(ConfigError::Duplicate {
                    kind: "tool",
                    name: rejected.name().to_string(),
                }
                .into());
            }
        }
        validate_tool_names(&tools)?;
        validate_transfer_names(&self.subagents)?;

        Ok(Agent {
            name: self.name,
            handoff_description: self.handoff_description,
            instructions: self.instructions,
            model,
            tools,
            subagents: RwLock::new(self.subagents),
            guardrails: self.guardrails,
            output_schema: self.output_schema,
            settings: self.settings,
            should_finish: self.should_finish,
            tokenizer: self.tokenizer.unwrap_or_else(default_tokenizer),
        })
    }
}
