use crate::{
    error::{AppError, AppResult},
    models::ShippingAddress,
};

const PINCODE_LEN: usize = 6;

pub fn validate_address(address: &ShippingAddress) -> AppResult<()> {
    let required = [
        ("street", &address.street),
        ("city", &address.city),
        ("state", &address.state),
        ("pincode", &address.pincode),
        ("country", &address.country),
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| *field)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "shipping_address is missing: {}",
            missing.join(", ")
        )));
    }

    let pincode = address.pincode.trim();
    if pincode.len() != PINCODE_LEN || !pincode.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::Validation(
            "shipping_address.pincode must be 6 digits".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            street: "12 MG Road".into(),
            city: "Bengaluru".into(),
            state: "Karnataka".into(),
            pincode: "560001".into(),
            country: "India".into(),
        }
    }

    #[test]
    fn complete_address_passes() {
        assert!(validate_address(&address()).is_ok());
    }

    #[test]
    fn missing_fields_are_listed() {
        let mut a = address();
        a.city = " ".into();
        a.country.clear();
        let err = validate_address(&a).unwrap_err().to_string();
        assert!(err.contains("city"));
        assert!(err.contains("country"));
    }

    #[test]
    fn pincode_must_be_six_digits() {
        for bad in ["56001", "5600011", "56OO01"] {
            let mut a = address();
            a.pincode = bad.into();
            assert!(validate_address(&a).is_err(), "{bad} should be rejected");
        }
    }
}
