//! Push-delivery policies selecting which service account may call a route.

// self
use crate::{_prelude::*, env::Env};

/// Upstream dispatchers that deliver pushes to this service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushPolicy {
	/// Cloud Tasks queue push.
	TaskQueue,
	/// Pub/Sub push subscription.
	Pubsub,
	/// Cloud Scheduler job.
	Scheduler,
}
impl PushPolicy {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			PushPolicy::TaskQueue => "task_queue",
			PushPolicy::Pubsub => "pubsub",
			PushPolicy::Scheduler => "scheduler",
		}
	}

	/// Returns the service account `env` authorizes for this policy.
	pub fn expected_account(self, env: &Env) -> &str {
		match self {
			PushPolicy::TaskQueue => &env.task_queue_push_service_account,
			PushPolicy::Pubsub => &env.pubsub_push_service_account,
			PushPolicy::Scheduler => &env.scheduler_push_service_account,
		}
	}
}
impl Display for PushPolicy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
