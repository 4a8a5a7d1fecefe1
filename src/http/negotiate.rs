use super::mime_types;

use std::cmp::Ordering;

/// The kind of value being negotiated.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Offer {
    /// `Accept`. Offers may be media types or file extensions.
    Type,
    /// `Accept-Charset` or `Accept-Encoding`.
    Token,
    /// `Accept-Language`. `en` accepts `en-US`.
    Language,
}

impl Offer {
    fn matches(self, spec: &str, offer: &str) -> bool {
        if spec == "*" {
            return true;
        }

        match self {
            Offer::Token => spec.eq_ignore_ascii_case(offer),
            Offer::Language => {
                spec.eq_ignore_ascii_case(offer)
                    || offer
                        .get(..spec.len())
                        .map_or(false, |prefix| prefix.eq_ignore_ascii_case(spec))
                        && offer.as_bytes().get(spec.len()) == Some(&b'-')
            }
            Offer::Type => {
                let offer = match offer.contains('/') {
                    true => offer,
                    false => match mime_types::from_extension(offer) {
                        Some(ty) => ty,
                        None => return false,
                    },
                };

                let offer = offer.split(';').next().unwrap_or_default().trim();
                let (offer_type, offer_sub) = offer.split_once('/').unwrap_or((offer, ""));
                let (spec_type, spec_sub) = spec.split_once('/').unwrap_or((spec, ""));

                match (spec_type, spec_sub) {
                    ("*", "*") => true,
                    (ty, "*") => ty.eq_ignore_ascii_case(offer_type),
                    (ty, sub) => {
                        ty.eq_ignore_ascii_case(offer_type) && sub.eq_ignore_ascii_case(offer_sub)
                    }
                }
            }
        }
    }
}

/// Pick the best of `offers` for an `Accept*` header.
///
/// Header entries are tried in order of decreasing quality, and for each
/// entry the first matching offer wins. Entries with `q=0` never match.
/// An empty header accepts the first offer.
pub(crate) fn negotiate<'o>(header: &str, offers: &[&'o str], kind: Offer) -> Option<&'o str> {
    let header = header.trim();
    if header.is_empty() {
        return offers.first().copied();
    }

    let mut specs: Vec<(&str, f32)> = header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let spec = parts.next()?.trim();
            if spec.is_empty() {
                return None;
            }

            let quality = parts
                .filter_map(|param| param.trim().strip_prefix("q="))
                .last()
                .map_or(1.0, |q| q.trim().parse().unwrap_or(0.0));

            (quality > 0.0).then(|| (spec, quality))
        })
        .collect();

    specs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    specs.iter().find_map(|(spec, _)| {
        offers
            .iter()
            .find(|offer| kind.matches(spec, offer))
            .copied()
    })
}
