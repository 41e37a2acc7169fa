//! Italian column-name hints.
//!
//! Imported headers are used verbatim unless hint resolution is switched on
//! (`CRM_APPLY_HEADER_HINTS`). When on, each header is matched once,
//! case-insensitively, as a substring against the table below in table
//! order; the first hit renames the column to the canonical label.

use crate::record::{ADDRESS, COMPANY_NAME, CONTACT_PERSON, EMAIL, LAST_CONTACT_DATE, NOTES, PHONE};
use lazy_static::lazy_static;

lazy_static! {
    static ref ITALIAN_HINTS: Vec<(&'static str, Vec<&'static str>)> = vec![
        (
            COMPANY_NAME,
            vec!["nome", "azienda", "società", "impresa", "ragione sociale", "nome azienda"],
        ),
        (ADDRESS, vec!["indirizzo", "via", "sede", "località", "luogo"]),
        (
            PHONE,
            vec!["telefono", "tel", "numero di telefono", "cellulare", "mobile"],
        ),
        (
            CONTACT_PERSON,
            vec!["contatto", "nome contatto", "referente", "persona di contatto", "responsabile"],
        ),
        (EMAIL, vec!["email", "e-mail", "posta elettronica", "mail"]),
        (
            LAST_CONTACT_DATE,
            vec!["data", "ultimo contatto", "data ultimo contatto", "ultima data", "giorno"],
        ),
        (
            NOTES,
            vec!["note", "commenti", "osservazioni", "descrizione", "dettagli"],
        ),
    ];
}

/// Canonical label for `header`, if any hint matches.
pub fn resolve_header(header: &str) -> Option<&'static str> {
    let needle = header.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    ITALIAN_HINTS
        .iter()
        .find(|(_, hints)| hints.iter().any(|hint| needle.contains(hint)))
        .map(|(label, _)| *label)
}
