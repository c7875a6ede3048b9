use rust_decimal::Decimal;
use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::validation::{PayloadErrors, INVALID, IS_REQUIRED};

/// Amounts are stored as `NUMERIC(14, 2)`.
pub const AMOUNT_SCALE: u32 = 2;
/// Exclusive upper bound on the magnitude of an amount.
// 1_000_000_000_000 (Decimal::new is not const).
pub const AMOUNT_LIMIT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateExpenseRequest {
    pub title: String,
    pub amount: Option<Decimal>,
    pub date: String,
    pub account_id: String,
    pub category_id: String,
}

/// Checked form of [`CreateExpenseRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub title: String,
    pub amount: Decimal,
    pub date: OffsetDateTime,
    pub account_id: String,
    pub category_id: String,
}

impl CreateExpenseRequest {
    pub fn validate(&self) -> Result<NewExpense, PayloadErrors> {
        let mut errs = PayloadErrors::default();
        errs.require("title", &self.title);

        let amount = match self.amount.map(|a| a.normalize()) {
            Some(a) if a.is_zero() => {
                errs.add("amount", IS_REQUIRED);
                a
            }
            Some(a) if a.scale() > AMOUNT_SCALE || a.abs() >= AMOUNT_LIMIT => {
                errs.add("amount", INVALID);
                a
            }
            Some(a) => a,
            None => {
                errs.add("amount", IS_REQUIRED);
                Decimal::ZERO
            }
        };

        let mut date = OffsetDateTime::UNIX_EPOCH;
        if errs.require("date", &self.date) {
            match OffsetDateTime::parse(self.date.trim(), &Rfc3339) {
                Ok(d) => date = d,
                Err(_) => errs.add("date", INVALID),
            }
        }

        errs.require("account_id", &self.account_id);
        errs.require("category_id", &self.category_id);

        errs.into_result()?;
        Ok(NewExpense {
            title: self.title.trim().to_string(),
            amount,
            date,
            account_id: self.account_id.trim().to_string(),
            category_id: self.category_id.trim().to_string(),
        })
    }
}

/// Body for creating an account or a category.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NamedRequest {
    pub name: String,
}

impl NamedRequest {
    pub fn validate(&self) -> Result<(), PayloadErrors> {
        let mut errs = PayloadErrors::default();
        errs.require("name", &self.name);
        errs.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn request() -> CreateExpenseRequest {
        CreateExpenseRequest {
            title: " Groceries ".into(),
            amount: Some(Decimal::new(4250, 2)),
            date: "2024-05-02T10:00:00Z".into(),
            account_id: "111".into(),
            category_id: "121".into(),
        }
    }

    #[test]
    fn valid_request_is_normalized() {
        let e = request().validate().unwrap();
        assert_eq!(e.title, "Groceries");
        assert_eq!(e.amount, Decimal::new(4250, 2));
        assert_eq!(e.date, datetime!(2024-05-02 10:00 UTC));
        assert_eq!(e.account_id, "111");
    }

    #[test]
    fn empty_request_flags_every_field() {
        let errs = CreateExpenseRequest::default().validate().unwrap_err();
        for field in ["title", "amount", "date", "account_id", "category_id"] {
            assert_eq!(errs.codes(field), &[IS_REQUIRED], "{field}");
        }
    }

    #[test]
    fn zero_amount_and_bad_date() {
        let req = CreateExpenseRequest {
            amount: Some(Decimal::ZERO),
            date: "yesterday".into(),
            ..request()
        };
        let errs = req.validate().unwrap_err();
        assert_eq!(errs.codes("amount"), &[IS_REQUIRED]);
        assert_eq!(errs.codes("date"), &[INVALID]);
        assert!(!errs.contains("title"));
    }

    #[test]
    fn amount_accepts_json_numbers() {
        let req: CreateExpenseRequest =
            serde_json::from_str(r#"{"title":"Taxi","amount":12.5,"date":"2024-05-02T10:00:00Z","account_id":"a","category_id":"c"}"#)
                .unwrap();
        assert_eq!(req.validate().unwrap().amount, Decimal::new(125, 1));
    }

    #[test]
    fn amount_must_fit_the_column() {
        for bad in [Decimal::new(1, 3), Decimal::new(12345, 3), AMOUNT_LIMIT, -AMOUNT_LIMIT] {
            let req = CreateExpenseRequest { amount: Some(bad), ..request() };
            assert_eq!(req.validate().unwrap_err().codes("amount"), &[INVALID], "{bad}");
        }

        // Trailing zeros do not count against the scale.
        let req = CreateExpenseRequest { amount: Some(Decimal::new(12500, 3)), ..request() };
        assert_eq!(req.validate().unwrap().amount, Decimal::new(125, 1));

        let largest = Decimal::new(99_999_999_999_999, 2);
        let req = CreateExpenseRequest { amount: Some(largest), ..request() };
        assert_eq!(req.validate().unwrap().amount, largest);
    }

    #[test]
    fn sub_cent_json_amount_is_invalid() {
        let req: CreateExpenseRequest = serde_json::from_str(
            r#"{"title":"Gum","amount":0.001,"date":"2024-05-02T10:00:00Z","account_id":"a","category_id":"c"}"#,
        )
        .unwrap();
        assert_eq!(req.validate().unwrap_err().codes("amount"), &[INVALID]);
    }

    #[test]
    fn named_request_requires_name() {
        assert!(NamedRequest { name: "Cash".into() }.validate().is_ok());
        let errs = NamedRequest::default().validate().unwrap_err();
        assert_eq!(errs.codes("name"), &[IS_REQUIRED]);
    }
}
