use crate::record::ResolvedRecord;
use crate::resolver::Field;
use serde::Serialize;

/// Message pre-filled in WhatsApp conversations.
pub const GREETING: &str = "Bonjour, c’est le service d’ophtalmologie.";

/// Number as it should be dialled: digits and `+` only.
pub fn dial_number(raw: &str) -> Option<String> {
    let number: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    if number.chars().any(|c| c.is_ascii_digit()) {
        Some(number)
    } else {
        None
    }
}

/// `tel:` link for the number.
pub fn tel_uri(raw: &str) -> Option<String> {
    dial_number(raw).map(|n| format!("tel:{n}"))
}

/// `wa.me` link for the number, with an optional pre-filled message.
///
/// # Examples
/// ```
/// use ophtatrack::contact::whatsapp_url;
///
/// assert_eq!(
///     whatsapp_url("+212 6 12 34 56 78", "Bonjour"),
///     Some("https://wa.me/212612345678?text=Bonjour".to_string())
/// );
/// ```
pub fn whatsapp_url(raw: &str, text: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    let mut url = format!("https://wa.me/{digits}");
    if !text.is_empty() {
        url.push_str("?text=");
        url.push_str(&urlencoding::encode(text));
    }
    Some(url)
}

/// WhatsApp needs the international form; a local `0…` number will not
/// reach anyone.
pub fn needs_international_prefix(raw: &str) -> bool {
    let raw = raw.trim();
    raw.starts_with('0') && !raw.starts_with('+')
}

/// Quick-contact links for one patient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContactLinks {
    pub number: String,
    pub tel: String,
    pub whatsapp: String,
    pub needs_international_prefix: bool,
}

impl ContactLinks {
    pub fn for_number(raw: &str, text: &str) -> Option<Self> {
        Some(ContactLinks {
            number: raw.trim().to_string(),
            tel: tel_uri(raw)?,
            whatsapp: whatsapp_url(raw, text)?,
            needs_international_prefix: needs_international_prefix(raw),
        })
    }

    /// Links for the record's phone field, greeting included.
    pub fn for_record(record: &ResolvedRecord<'_>) -> Option<Self> {
        let phone = record.text(Field::Phone)?;
        Self::for_number(&phone, GREETING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, ingest};

    #[test]
    fn keeps_only_dialable_characters() {
        assert_eq!(dial_number("06 12-34.56 78"), Some("0612345678".to_string()));
        assert_eq!(dial_number("+33 (0)1 23"), Some("+330123".to_string()));
        assert_eq!(dial_number("n/a"), None);
        assert_eq!(dial_number("+"), None);
        assert_eq!(tel_uri("+212 600"), Some("tel:+212600".to_string()));
    }

    #[test]
    fn whatsapp_encodes_message() {
        assert_eq!(
            whatsapp_url("+212600", GREETING),
            Some(format!("https://wa.me/212600?text={}", urlencoding::encode(GREETING)))
        );
        assert_eq!(whatsapp_url("+212600", ""), Some("https://wa.me/212600".to_string()));
        assert_eq!(whatsapp_url("", "x"), None);
    }

    #[test]
    fn warns_on_local_numbers() {
        assert!(needs_international_prefix(" 0612345678"));
        assert!(!needs_international_prefix("+212612345678"));
        assert!(!needs_international_prefix("212612345678"));
    }

    #[test]
    fn links_for_a_record() {
        let records = vec![
            Record::from([("Nom", "Dupont"), ("Téléphone", "0612345678")]),
            Record::from([("Nom", "Martin")]),
        ];
        let views = ingest(&records);

        let links = ContactLinks::for_record(&views[0]);
        assert_eq!(links.as_ref().map(|l| l.tel.as_str()), Some("tel:0612345678"));
        assert_eq!(links.map(|l| l.needs_international_prefix), Some(true));
        assert_eq!(ContactLinks::for_record(&views[1]), None);
    }
}
