pub mod account;
pub mod server;

// Internal "interpreter" for `Action`.
mod run;

use secrecy::SecretString;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    SignIn(account::Args, account::SignIn),
    SignUp(account::Args, String, SecretString),
    Confirm(account::Args, String, String),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
