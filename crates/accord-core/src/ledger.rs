//! Append, signing, and selective-carryover semantics for the proposal log.
//!
//! An RFC is never partially mutated in place by the workflow: every update
//! replaces the entire action list and re-signs everything. Comments are the
//! only action type carried across such replacements; add/update/load/approve
//! actions must be resubmitted by the client or they are lost.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use crate::error::CoreError;
use crate::hash::sha256_hex;
use crate::types::*;

impl Action {
    /// Content signature: canonical JSON of this action with its own
    /// signature field cleared (and therefore omitted), hashed with SHA-256.
    pub fn content_signature(&self) -> Result<String, CoreError> {
        let mut unsigned = self.clone();
        unsigned.signature = String::new();
        let bytes = serde_json::to_vec(&unsigned)?;
        Ok(sha256_hex(&bytes))
    }
}

impl Rfc {
    /// Content signature over the current action sequence, excluding the
    /// RFC's own signature field.
    pub fn content_signature(&self) -> Result<String, CoreError> {
        let mut unsigned = self.clone();
        unsigned.signature = String::new();
        let bytes = serde_json::to_vec(&unsigned)?;
        Ok(sha256_hex(&bytes))
    }

    /// Recompute the RFC signature from the current action list. Callers run
    /// this once after a batch of appends rather than per append.
    pub fn refresh_signature(&mut self) -> Result<(), CoreError> {
        self.signature = self.content_signature()?;
        Ok(())
    }

    /// Sign every action in place.
    pub fn sign_actions(&mut self) -> Result<(), CoreError> {
        for action in &mut self.actions {
            action.signature = action.content_signature()?;
        }
        Ok(())
    }

    /// Sign the given action and append it. Does NOT refresh the RFC's own
    /// signature; the caller refreshes after the batch.
    pub fn append_action(&mut self, mut action: Action) -> Result<(), CoreError> {
        action.signature = action.content_signature()?;
        self.actions.push(action);
        Ok(())
    }

    /// Copy the persistent actions from the given prior RFC into this one,
    /// original signatures preserved. Only comments are persistent: they are
    /// durable audit trail, everything else is resubmitted explicitly.
    pub fn carry_persistent_actions(&mut self, old: &Rfc) {
        for action in &old.actions {
            if action.action_type == ActionType::Comment {
                self.actions.push(action.clone());
            }
        }
    }

    /// Attach review comments, attributed to the given commenter.
    ///
    /// Keys of `comments` are target signatures, values the comment texts for
    /// that target. A key matching an existing action's signature produces
    /// action-targeted comments; any other key (including the dangling case)
    /// produces RFC-targeted comments, annotated with a "target not found"
    /// note unless the key is the RFC's own signature. Comments are never
    /// silently dropped.
    pub fn attach_comments(
        &mut self,
        comments: &BTreeMap<String, Vec<String>>,
        commenter: &str,
    ) -> Result<(), CoreError> {
        let known: HashSet<String> = self
            .actions
            .iter()
            .map(|action| action.signature.clone())
            .collect();

        for (target_signature, texts) in comments {
            for text in texts {
                let mut comment = if known.contains(target_signature) {
                    Action::new(
                        ActionType::Comment,
                        Some(Target::by_signature(
                            TargetType::Action,
                            target_signature.clone(),
                        )),
                    )
                } else {
                    let mut action = Action::new(
                        ActionType::Comment,
                        Some(Target::by_signature(
                            TargetType::Rfc,
                            self.signature.clone(),
                        )),
                    );
                    if target_signature != &self.signature {
                        action.data.insert(
                            NOTE_KEY.to_string(),
                            Value::from(format!(
                                "target with signature {target_signature} was not found in this RFC"
                            )),
                        );
                    }
                    action
                };
                comment
                    .data
                    .insert(COMMENT_KEY.to_string(), Value::from(text.as_str()));
                comment
                    .data
                    .insert(COMMENTER_KEY.to_string(), Value::from(commenter));
                self.append_action(comment)?;
            }
        }

        Ok(())
    }

    /// Set the load status, attributed to the given requester. Overwrites the
    /// existing load action in place (re-signing it) when one exists, appends
    /// one otherwise, so at most one load action ever exists per RFC.
    pub fn upsert_load_status(
        &mut self,
        status: LoadStatus,
        requester: &str,
    ) -> Result<(), CoreError> {
        for action in &mut self.actions {
            if action.action_type == ActionType::Load {
                action
                    .data
                    .insert(STATUS_KEY.to_string(), Value::from(status.as_str()));
                action
                    .data
                    .insert(REQUESTER_KEY.to_string(), Value::from(requester));
                action.signature = action.content_signature()?;
                return Ok(());
            }
        }

        let load = Action::new(ActionType::Load, None)
            .with_data(STATUS_KEY, status.as_str())
            .with_data(REQUESTER_KEY, requester);
        self.append_action(load)
    }

    /// Current load status, if a load action exists.
    pub fn current_load_status(&self) -> Option<&str> {
        self.actions
            .iter()
            .find(|action| action.action_type == ActionType::Load)
            .and_then(|action| action.data.get(STATUS_KEY))
            .and_then(Value::as_str)
    }
}
