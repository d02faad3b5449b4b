//! Identity collaborator.
//!
//! Supplies the signed-in user's name to prefill the delivery form.
//! Authentication itself is out of scope.

use market_config::IdentityConfig;

/// The user on whose behalf the checkout runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
	pub name: Option<String>,
	pub email: Option<String>,
}

/// Source of the current user, if anyone is signed in.
pub trait IdentityProvider: Send + Sync {
	fn current_user(&self) -> Option<CurrentUser>;
}

/// Identity taken from the `[identity]` configuration section.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredIdentity {
	user: Option<CurrentUser>,
}

impl ConfiguredIdentity {
	/// Nobody is signed in.
	pub fn anonymous() -> Self {
		Self::default()
	}

	/// Blank values count as unset, so `name = "${USER_NAME:-}"` may resolve
	/// to nobody.
	pub fn from_config(config: Option<&IdentityConfig>) -> Self {
		let non_blank = |value: &Option<String>| {
			value
				.as_deref()
				.map(str::trim)
				.filter(|v| !v.is_empty())
				.map(str::to_string)
		};
		let user = config
			.map(|c| CurrentUser {
				name: non_blank(&c.name),
				email: non_blank(&c.email),
			})
			.filter(|u| u.name.is_some() || u.email.is_some());
		Self { user }
	}
}

impl IdentityProvider for ConfiguredIdentity {
	fn current_user(&self) -> Option<CurrentUser> {
		self.user.clone()
	}
}
