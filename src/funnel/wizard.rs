//! The quote funnel as an explicit state machine: four linear steps with
//! guarded transitions, independent of any UI framework.

use crate::funnel::preprocessor::{prepare_photos, PickedFile};
use crate::model::quote::ServiceKind;
use crate::util::error::FieldError;
use crate::util::validate::{is_valid_contact, normalize_contact};

/// The four wizard steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Items,
    Location,
    Photos,
    Contact,
}

/// One textile object being described in step 1.
#[derive(Debug, Clone)]
pub struct ItemDraft {
    pub service: ServiceKind,
    pub dimensions: String,
    pub details: String,
}

impl Default for ItemDraft {
    fn default() -> Self {
        ItemDraft {
            service: ServiceKind::Sofa,
            dimensions: String::new(),
            details: String::new(),
        }
    }
}

/// Payload assembled at submit time, mirroring the intake endpoint's fields.
#[derive(Debug, Clone)]
pub struct SubmissionPayload {
    pub service: ServiceKind,
    pub city: String,
    pub postal_code: String,
    pub address: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub items_json: String,
    pub photos: Vec<PickedFile>,
}

/// Analytics event fired after a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionEvent {
    pub service: ServiceKind,
    pub city: String,
    pub postal_code: String,
    pub item_count: usize,
    pub has_contact: bool,
    pub photo_count: usize,
}

/// Wizard state. Starts on [`WizardStep::Items`] with a single default item;
/// the item list never becomes empty.
#[derive(Debug)]
pub struct QuoteWizard {
    step: WizardStep,
    pub items: Vec<ItemDraft>,
    pub city: String,
    pub postal_code: String,
    pub address: String,
    pub photos: Vec<PickedFile>,
    file_error: Option<String>,
    pub name: String,
    pub contact: String,
}

impl Default for QuoteWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteWizard {
    pub fn new() -> Self {
        QuoteWizard {
            step: WizardStep::Items,
            items: vec![ItemDraft::default()],
            city: String::new(),
            postal_code: String::new(),
            address: String::new(),
            photos: Vec::new(),
            file_error: None,
            name: String::new(),
            contact: String::new(),
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn file_error(&self) -> Option<&str> {
        self.file_error.as_deref()
    }

    /// Advance to the next step if the current step's guard passes. On
    /// failure the step does not change and the field errors are returned.
    pub fn advance(&mut self) -> Result<WizardStep, Vec<FieldError>> {
        let next = match self.step {
            WizardStep::Items => WizardStep::Location,
            WizardStep::Location => {
                let errors = self.location_errors();
                if !errors.is_empty() {
                    return Err(errors);
                }
                WizardStep::Photos
            }
            WizardStep::Photos => {
                if let Some(ref msg) = self.file_error {
                    return Err(vec![FieldError::new("Photos", msg.clone())]);
                }
                WizardStep::Contact
            }
            WizardStep::Contact => return Ok(self.step),
        };
        self.step = next;
        Ok(next)
    }

    /// Go back one step. Always allowed except on the first step.
    pub fn back(&mut self) -> WizardStep {
        self.step = match self.step {
            WizardStep::Items => WizardStep::Items,
            WizardStep::Location => WizardStep::Items,
            WizardStep::Photos => WizardStep::Location,
            WizardStep::Contact => WizardStep::Photos,
        };
        self.step
    }

    fn location_errors(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.city.trim().len() < 2 {
            errors.push(FieldError::new("Ville", "Veuillez indiquer votre ville."));
        }
        if self.postal_code.trim().len() < 4 {
            errors.push(FieldError::new(
                "Code postal",
                "Veuillez indiquer un code postal valide.",
            ));
        }
        errors
    }

    fn contact_errors(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.name.trim().len() < 2 {
            errors.push(FieldError::new("Nom", "Veuillez indiquer votre nom."));
        }
        if !is_valid_contact(&self.contact) {
            errors.push(FieldError::new(
                "Contact",
                "Indiquez un email ou un numéro de téléphone valide.",
            ));
        }
        errors
    }

    pub fn add_item(&mut self) {
        self.items.push(ItemDraft::default());
    }

    /// Remove one item. Refused (returns false) when only one remains.
    pub fn remove_item(&mut self, index: usize) -> bool {
        if self.items.len() <= 1 || index >= self.items.len() {
            return false;
        }
        self.items.remove(index);
        true
    }

    /// Run the picked files through the preprocessor and record any notice as
    /// an unresolved file error blocking the Photos step.
    pub fn add_photos(&mut self, picked: Vec<PickedFile>) {
        let outcome = prepare_photos(std::mem::take(&mut self.photos), picked);
        self.photos = outcome.files;
        self.file_error = outcome.notice;
    }

    pub fn dismiss_file_error(&mut self) {
        self.file_error = None;
    }

    /// Blur normalization of the contact field (phone punctuation stripping,
    /// `00` prefix rewrite). Email-shaped values pass through.
    pub fn normalize_contact_field(&mut self) {
        self.contact = normalize_contact(&self.contact);
    }

    /// Assemble the submission payload. Only reachable from the Contact step;
    /// on guard failure the wizard stays put with all state intact.
    ///
    /// The caller performs the network call and then either `reset()`s on
    /// success or leaves the wizard untouched for a retry.
    pub fn submit(&self) -> Result<(SubmissionPayload, SubmissionEvent), Vec<FieldError>> {
        if self.step != WizardStep::Contact {
            return Err(vec![FieldError::new(
                "Formulaire",
                "Complétez les étapes précédentes avant d'envoyer.",
            )]);
        }
        let errors = self.contact_errors();
        if !errors.is_empty() {
            return Err(errors);
        }

        let contact = self.contact.trim();
        let (email, phone) = if contact.contains('@') {
            (Some(contact.to_string()), None)
        } else {
            (None, Some(normalize_contact(contact)))
        };

        let items: Vec<serde_json::Value> = self
            .items
            .iter()
            .map(|item| {
                serde_json::json!({
                    "service": item.service,
                    "dimensions": non_empty(&item.dimensions),
                    "details": non_empty(&item.details),
                })
            })
            .collect();

        let service = self
            .items
            .first()
            .map(|item| item.service)
            .unwrap_or(ServiceKind::Other);

        let payload = SubmissionPayload {
            service,
            city: self.city.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            address: non_empty(&self.address),
            name: self.name.trim().to_string(),
            email,
            phone,
            items_json: serde_json::Value::Array(items).to_string(),
            photos: self.photos.clone(),
        };

        let event = SubmissionEvent {
            service,
            city: payload.city.clone(),
            postal_code: payload.postal_code.clone(),
            item_count: self.items.len(),
            has_contact: true,
            photo_count: self.photos.len(),
        };

        Ok((payload, event))
    }

    /// Clear everything back to the initial Items step.
    pub fn reset(&mut self) {
        *self = QuoteWizard::new();
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
