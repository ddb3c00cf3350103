//! Interactive authorization-code flow producing the initial bundle
//!
//! The flow is a fixed list of [`Step`]s walked in order by
//! [`AuthorizationFlow::run`]. Console I/O goes through a [`Prompter`], so the
//! same driver serves the terminal generator and scripted tests.
//!
//! Declining any confirmation ends the run with `UserAborted` before anything
//! is written. Empty answers are re-asked. Once the code is exchanged the
//! bundle is appended to every target of the [`CredentialSink`].

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Url;

use crate::auth::{CredentialBundle, CredentialSink, OAuthClient, OAuthConfig, PkceChallenge};
use crate::error::{AuthError, Result};

/// Google Cloud console page for creating a project
pub const NEW_PROJECT_URL: &str = "https://console.developers.google.com/projectcreate";
/// Library page of the Photos Library API
pub const PHOTOS_API_URL: &str =
    "https://console.developers.google.com/apis/library/photoslibrary.googleapis.com";
/// Console page for creating an OAuth client
pub const OAUTH_CLIENT_URL: &str =
    "https://console.developers.google.com/apis/credentials/oauthclient";

/// Question asked after every instruction block
pub const CONFIRM_MESSAGE: &str = "I read and followed the instructions";
const ABORT_MESSAGE: &str = "Please read and follow the instructions";

/// Console I/O used by the flow.
///
/// Implementations block until the operator answers.
pub trait Prompter: Send {
    /// Start of the session
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be written.
    fn intro(&mut self, title: &str) -> Result<()>;

    /// Show an instruction block
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be written.
    fn note(&mut self, title: &str, body: &str) -> Result<()>;

    /// Ask a yes/no question, defaulting to no
    ///
    /// # Errors
    ///
    /// Returns an error if the answer cannot be read.
    fn confirm(&mut self, message: &str) -> Result<bool>;

    /// Ask for a line of text; may return an empty string
    ///
    /// # Errors
    ///
    /// Returns an error if the answer cannot be read.
    fn input(&mut self, message: &str) -> Result<String>;

    /// Report a recoverable problem
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be written.
    fn warn(&mut self, message: &str) -> Result<()>;

    /// Report the final result
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be written.
    fn success(&mut self, message: &str) -> Result<()>;
}

/// Values the operator types in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// OAuth client id
    ClientId,
    /// OAuth client secret
    ClientSecret,
    /// Code (or redirect URL) copied after consent
    AuthorizationCode,
}

impl Field {
    /// Normalized answer, `None` when it does not count as an answer
    #[must_use]
    pub fn normalize(self, raw: &str) -> Option<String> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }
        match self {
            Self::ClientId | Self::ClientSecret => Some(value.to_string()),
            Self::AuthorizationCode => extract_code(value),
        }
    }
}

/// One step of the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Show instructions and a console URL, then require confirmation
    Confirm {
        /// Heading
        title: &'static str,
        /// Extra instruction lines
        details: &'static [&'static str],
        /// Page to open
        url: &'static str,
    },
    /// Ask for a value until a non-empty one is given
    Input {
        /// Which value
        field: Field,
        /// Prompt text
        message: &'static str,
        /// Shown once before the prompt
        hint: Option<&'static str>,
    },
    /// Show the consent URL built from the collected client credentials
    Authorize,
}

/// The generator's steps, in order
pub const STEPS: &[Step] = &[
    Step::Confirm {
        title: "Create a new Google project:",
        details: &[],
        url: NEW_PROJECT_URL,
    },
    Step::Confirm {
        title: "Enable Google Photos API:",
        details: &[],
        url: PHOTOS_API_URL,
    },
    Step::Confirm {
        title: "Create an \"OAuth Client ID\" with the config:",
        details: &[
            "Name: \"google-photos-token\"",
            "Type: \"Web application\"",
            "Redirect uri: \"http://localhost\"",
        ],
        url: OAUTH_CLIENT_URL,
    },
    Step::Input {
        field: Field::ClientId,
        message: "Client ID:",
        hint: Some("Copy your `Client ID` and `Client secret`"),
    },
    Step::Input {
        field: Field::ClientSecret,
        message: "Client Secret:",
        hint: None,
    },
    Step::Authorize,
    Step::Input {
        field: Field::AuthorizationCode,
        message: "Code:",
        hint: None,
    },
];

/// Pull the `code` out of a pasted redirect URL or query string; anything
/// else is taken as the bare code.
#[must_use]
pub fn extract_code(input: &str) -> Option<String> {
    let input = input.trim();
    let url = if input.contains("://") {
        Url::parse(input).ok()
    } else if input.contains("code=") {
        Url::parse(&format!(
            "http://localhost/?{}",
            input.trim_start_matches(['/', '?'])
        ))
        .ok()
    } else {
        None
    };

    match url {
        Some(url) => url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, code)| code.trim().to_string())
            .filter(|code| !code.is_empty()),
        None => (!input.is_empty()).then(|| input.to_string()),
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct FlowOutcome {
    /// The acquired bundle
    pub bundle: CredentialBundle,
    /// Where it was written
    pub targets: Vec<PathBuf>,
}

#[derive(Default)]
struct Answers {
    client_id: Option<String>,
    client_secret: Option<String>,
    code: Option<String>,
    client: Option<OAuthClient>,
}

impl Answers {
    fn set(&mut self, field: Field, value: String) {
        match field {
            Field::ClientId => self.client_id = Some(value),
            Field::ClientSecret => self.client_secret = Some(value),
            Field::AuthorizationCode => self.code = Some(value),
        }
    }
}

/// Drives [`STEPS`] against a prompter
pub struct AuthorizationFlow {
    config: OAuthConfig,
    sink: Arc<dyn CredentialSink>,
}

impl AuthorizationFlow {
    /// Flow using `config` endpoints and writing to `sink`
    pub fn new(config: OAuthConfig, sink: impl CredentialSink + 'static) -> Self {
        Self {
            config,
            sink: Arc::new(sink),
        }
    }

    /// The steps this flow walks
    #[must_use]
    pub fn steps(&self) -> &'static [Step] {
        STEPS
    }

    /// Run every step, exchange the code and persist the bundle.
    ///
    /// # Errors
    ///
    /// - `UserAborted` when a confirmation is declined
    /// - `TokenExchangeFailed` when the provider rejects the code
    /// - I/O errors from the prompter or the sink
    pub async fn run(&self, prompter: &mut dyn Prompter) -> Result<FlowOutcome> {
        let pkce = PkceChallenge::generate();
        let mut answers = Answers::default();

        prompter.intro("Google Photos token generator")?;

        for step in self.steps() {
            match *step {
                Step::Confirm {
                    title,
                    details,
                    url,
                } => {
                    let mut body = details.join("\n");
                    if !body.is_empty() {
                        body.push_str("\n\n");
                    }
                    body.push_str(url);
                    prompter.note(title, &body)?;

                    if !prompter.confirm(CONFIRM_MESSAGE)? {
                        tracing::debug!(title, "Confirmation declined");
                        return Err(AuthError::user_aborted(ABORT_MESSAGE));
                    }
                }
                Step::Input {
                    field,
                    message,
                    hint,
                } => {
                    if let Some(hint) = hint {
                        prompter.note(hint, "")?;
                    }
                    let value = ask(prompter, field, message)?;
                    answers.set(field, value);
                }
                Step::Authorize => {
                    let (Some(client_id), Some(client_secret)) =
                        (&answers.client_id, &answers.client_secret)
                    else {
                        return Err(AuthError::invalid_config(
                            "authorize step needs the client id and secret first",
                        ));
                    };
                    let client =
                        OAuthClient::new(client_id, client_secret, self.config.clone());
                    let auth_url = client.authorization_url(Some(&pkce))?;

                    prompter.note(
                        "Open the following URL in a browser",
                        &format!(
                            "{auth_url}\n\n\
                             Ignore the insecure warning\n\
                             Authorize the application\n\
                             Copy the code from the callback URL\n\
                             {}/?...&code=  [_COPY_THIS_]  &...",
                            self.config.redirect_uri
                        ),
                    )?;
                    answers.client = Some(client);
                }
            }
        }

        let (Some(client), Some(client_id), Some(client_secret), Some(code)) = (
            answers.client,
            answers.client_id,
            answers.client_secret,
            answers.code,
        ) else {
            return Err(AuthError::invalid_config(
                "flow finished without collecting every answer",
            ));
        };

        let tokens = client.exchange_code(&code, Some(pkce.verifier())).await?;
        let bundle = CredentialBundle::from_token_set(client_id, client_secret, tokens);

        if let Some(reason) = bundle.validation_error() {
            tracing::warn!(%reason, "Provider returned an incomplete token");
            prompter.warn(&format!(
                "The returned token is not usable yet ({reason}); it is saved anyway"
            ))?;
        }

        let targets = self.sink.store(&bundle)?;
        tracing::info!(targets = targets.len(), "Credential bundle persisted");
        prompter.success("Token added successfully to your .env files")?;

        Ok(FlowOutcome { bundle, targets })
    }
}

/// Ask until the answer normalizes to a value
fn ask(prompter: &mut dyn Prompter, field: Field, message: &str) -> Result<String> {
    loop {
        let raw = prompter.input(message)?;
        if let Some(value) = field.normalize(&raw) {
            return Ok(value);
        }
        let error = AuthError::validation(format!("{} is required", message.trim_end_matches(':')));
        prompter.warn(&error.to_string())?;
    }
}
