//! Runtime environment record identifying where the service runs and who may push to it.

// self
use crate::{_prelude::*, error::ConfigError};

/// Known deployment environments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvId {
	/// Development.
	Dev,
	/// Staging.
	Stg,
	/// User acceptance testing.
	Uat,
	/// Production.
	Prd,
}
impl EnvId {
	/// Returns the symbolic name used in object keys and logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			EnvId::Dev => "dev",
			EnvId::Stg => "stg",
			EnvId::Uat => "uat",
			EnvId::Prd => "prd",
		}
	}
}
impl Display for EnvId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for EnvId {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"dev" => Ok(EnvId::Dev),
			"stg" => Ok(EnvId::Stg),
			"uat" => Ok(EnvId::Uat),
			"prd" => Ok(EnvId::Prd),
			_ => Err(ConfigError::UnknownEnvironment { value: s.to_owned() }),
		}
	}
}

/// Environment configuration created once at process start and shared immutably afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Env {
	/// Deployment environment.
	pub id: EnvId,
	/// This service's identifier; the audience expected on inbound push tokens.
	pub svc_id: String,
	/// Service account Cloud Tasks uses when pushing to this service.
	pub task_queue_push_service_account: String,
	/// Service account Pub/Sub uses when pushing to this service.
	pub pubsub_push_service_account: String,
	/// Service account Cloud Scheduler uses when pushing to this service.
	pub scheduler_push_service_account: String,
}
impl Env {
	/// Variable holding the environment identifier.
	pub const ENV_ID: &'static str = "ENV_ID";
	/// Variable holding the service identifier.
	pub const SVC_ID: &'static str = "SVC_ID";
	/// Variable holding the task-queue push service account.
	pub const TASK_QUEUE_PUSH_SERVICE_ACCOUNT: &'static str = "TASK_QUEUE_PUSH_SERVICE_ACCOUNT";
	/// Variable holding the Pub/Sub push service account.
	pub const PUBSUB_PUSH_SERVICE_ACCOUNT: &'static str = "PUBSUB_PUSH_SERVICE_ACCOUNT";
	/// Variable holding the scheduler push service account.
	pub const SCHEDULER_PUSH_SERVICE_ACCOUNT: &'static str = "SCHEDULER_PUSH_SERVICE_ACCOUNT";

	/// Creates an environment with empty push accounts.
	pub fn new(id: EnvId, svc_id: impl Into<String>) -> Self {
		Self {
			id,
			svc_id: svc_id.into(),
			task_queue_push_service_account: String::new(),
			pubsub_push_service_account: String::new(),
			scheduler_push_service_account: String::new(),
		}
	}

	/// Sets the task-queue push service account.
	pub fn with_task_queue_push_service_account(mut self, account: impl Into<String>) -> Self {
		self.task_queue_push_service_account = account.into();

		self
	}

	/// Sets the Pub/Sub push service account.
	pub fn with_pubsub_push_service_account(mut self, account: impl Into<String>) -> Self {
		self.pubsub_push_service_account = account.into();

		self
	}

	/// Sets the scheduler push service account.
	pub fn with_scheduler_push_service_account(mut self, account: impl Into<String>) -> Self {
		self.scheduler_push_service_account = account.into();

		self
	}

	/// Loads the environment from the current process's variables.
	pub fn from_process_env() -> Result<Self, ConfigError> {
		Self::from_vars(std::env::vars())
	}

	/// Loads the environment from an arbitrary variable set.
	pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let vars = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect::<HashMap<_, _>>();

		Ok(Self {
			id: required_var(&vars, Self::ENV_ID)?.parse()?,
			svc_id: required_var(&vars, Self::SVC_ID)?,
			task_queue_push_service_account: required_var(
				&vars,
				Self::TASK_QUEUE_PUSH_SERVICE_ACCOUNT,
			)?,
			pubsub_push_service_account: required_var(&vars, Self::PUBSUB_PUSH_SERVICE_ACCOUNT)?,
			scheduler_push_service_account: required_var(
				&vars,
				Self::SCHEDULER_PUSH_SERVICE_ACCOUNT,
			)?,
		})
	}
}

/// Reads a variable, trimming whitespace and rejecting blanks.
pub(crate) fn required_var(
	vars: &HashMap<String, String>,
	name: &'static str,
) -> Result<String, ConfigError> {
	vars.get(name)
		.map(|value| value.trim())
		.filter(|value| !value.is_empty())
		.map(str::to_owned)
		.ok_or(ConfigError::MissingVariable { name })
}
