use inquire::{InquireError, Password, PasswordDisplayMode, Text};

use crate::error::{Error, Result};
use crate::remote::CredentialSource;
use crate::sync::Confirm;

fn prompt_error(err: InquireError) -> Error {
    match err {
        InquireError::OperationCanceled | InquireError::OperationInterrupted => Error::UserAborted,
        InquireError::NotTTY => {
            Error::Config("cannot prompt without a terminal; pass -auto-approve or the missing flags".into())
        }
        other => Error::Config(other.to_string()),
    }
}

/// Asks on the terminal before anything is created or deleted.
pub struct InteractiveConfirm;

impl Confirm for InteractiveConfirm {
    fn confirm(&mut self, message: &str) -> Result<bool> {
        inquire::Confirm::new(message)
            .with_default(false)
            .prompt()
            .map_err(prompt_error)
    }
}

fn non_empty(input: &str) -> std::result::Result<inquire::validator::Validation, inquire::CustomUserError> {
    if input.trim().is_empty() {
        Ok(inquire::validator::Validation::Invalid("Value is required".into()))
    } else {
        Ok(inquire::validator::Validation::Valid)
    }
}

/// Credentials from flags where given, prompted for otherwise.
#[derive(Debug, Clone, Default)]
pub struct PromptCredentials {
    email: Option<String>,
    password: Option<String>,
}

impl PromptCredentials {
    pub fn new(email: Option<String>, password: Option<String>) -> Self {
        Self { email, password }
    }
}

impl CredentialSource for PromptCredentials {
    fn email(&mut self) -> Result<String> {
        if let Some(email) = &self.email {
            return Ok(email.clone());
        }
        let email = Text::new("Developer email:")
            .with_validator(non_empty)
            .prompt()
            .map_err(prompt_error)?;
        self.email = Some(email.clone());
        Ok(email)
    }

    fn password(&mut self) -> Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        let password = Password::new("Password:")
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .prompt()
            .map_err(prompt_error)?;
        self.password = Some(password.clone());
        Ok(password)
    }

    fn two_factor_code(&mut self) -> Result<String> {
        Text::new("Two-factor code:")
            .with_validator(non_empty)
            .prompt()
            .map(|code| code.trim().to_string())
            .map_err(prompt_error)
    }
}

/// Prompts for a value a flag did not supply.
pub fn text_or_prompt(value: Option<String>, label: &str) -> anyhow::Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        Some(_) => anyhow::bail!("{label} cannot be empty"),
        None => Ok(Text::new(&format!("{label}:"))
            .with_validator(non_empty)
            .prompt()
            .map_err(prompt_error)?
            .trim()
            .to_string()),
    }
}
