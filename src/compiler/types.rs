use crate::value::ValueType;

/// Whether `article` (der/die/das) agrees with `type_name`'s grammatical
/// gender, per the declaration grammar: `der` takes only Boolean, `das`
/// only Buchstabe, `die` takes the remaining scalar and all array types.
///
/// `das` is accepted here even though the retrieved original scanner's
/// keyword table has the `das` mapping commented out — this crate follows
/// the specification's own resolved reading that `das Zeichen` is legal.
pub fn article_matches(article: ArticleGender, value_type: ValueType) -> bool {
    match article {
        ArticleGender::Der => value_type == ValueType::Boolean,
        ArticleGender::Das => value_type == ValueType::Buchstabe,
        ArticleGender::Die => matches!(
            value_type,
            ValueType::Zahl
                | ValueType::Kommazahl
                | ValueType::Text
                | ValueType::ZahlenArr
                | ValueType::KommazahlenArr
                | ValueType::BooleanArr
                | ValueType::BuchstabenArr
                | ValueType::TexteArr
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleGender {
    Der,
    Die,
    Das,
}

impl ArticleGender {
    pub fn german_word(self) -> &'static str {
        match self {
            ArticleGender::Der => "der",
            ArticleGender::Die => "die",
            ArticleGender::Das => "das",
        }
    }
}

/// The static promotion a binary arithmetic operator applies when its two
/// operands' types differ: `Zahl` widens to `Kommazahl`, everything else
/// must match exactly.
pub fn promote(left: ValueType, right: ValueType) -> Option<ValueType> {
    if left == right {
        return Some(left);
    }
    match (left, right) {
        (ValueType::Zahl, ValueType::Kommazahl) | (ValueType::Kommazahl, ValueType::Zahl) => {
            Some(ValueType::Kommazahl)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn der_only_matches_boolean() {
        assert!(article_matches(ArticleGender::Der, ValueType::Boolean));
        assert!(!article_matches(ArticleGender::Der, ValueType::Zahl));
    }

    #[test]
    fn das_only_matches_buchstabe() {
        assert!(article_matches(ArticleGender::Das, ValueType::Buchstabe));
        assert!(!article_matches(ArticleGender::Das, ValueType::Text));
    }

    #[test]
    fn die_matches_scalars_and_arrays() {
        assert!(article_matches(ArticleGender::Die, ValueType::Zahl));
        assert!(article_matches(ArticleGender::Die, ValueType::Text));
        assert!(article_matches(ArticleGender::Die, ValueType::ZahlenArr));
        assert!(!article_matches(ArticleGender::Die, ValueType::Boolean));
    }

    #[test]
    fn promote_widens_int_and_double() {
        assert_eq!(promote(ValueType::Zahl, ValueType::Kommazahl), Some(ValueType::Kommazahl));
        assert_eq!(promote(ValueType::Kommazahl, ValueType::Zahl), Some(ValueType::Kommazahl));
    }

    #[test]
    fn promote_rejects_incompatible_types() {
        assert_eq!(promote(ValueType::Text, ValueType::Zahl), None);
    }

    #[test]
    fn promote_same_type_is_identity() {
        assert_eq!(promote(ValueType::Text, ValueType::Text), Some(ValueType::Text));
    }
}
