use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw form input; everything is a string until validation converts it into
/// an `EmployeeRecord` for the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmployeeForm {
    pub employee_code: String,
    pub employee_name: String,
    pub gender: String,
    pub date_of_birth: String,
    pub date_of_joining: String,
    pub designation: String,
    pub ctc_at_joining: String,
    pub aadhaar_number: String,
    pub uan: String,
    pub personal_email_id: String,
    pub official_email_id: String,
    pub contact_number: String,
    pub emergency_contact_name: String,
    pub emergency_contact_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeRecord {
    pub employee_code: String,
    pub employee_name: String,
    pub gender: String,
    pub date_of_birth: String,
    pub date_of_joining: String,
    pub designation: String,
    pub ctc_at_joining: f64,
    pub aadhaar_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uan: Option<String>,
    pub personal_email_id: String,
    pub official_email_id: String,
    pub contact_number: String,
    pub emergency_contact_name: String,
    pub emergency_contact_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnboardReceipt {
    pub status: String,
    pub id: String,
    pub excel_export: String,
}

/// Input mask for the CTC field: keeps digits and the first decimal point.
pub fn sanitize_ctc_input(raw: &str) -> String {
    let mut out = String::new();
    let mut seen_point = false;
    for ch in raw.chars() {
        if ch.is_ascii_digit() {
            out.push(ch);
        } else if ch == '.' && !seen_point {
            seen_point = true;
            out.push(ch);
        }
    }
    out
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

fn check_length(
    errors: &mut BTreeMap<String, String>,
    field: &str,
    label: &str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = value.trim().len();
    if len < min {
        if min <= 1 {
            errors.insert(field.to_string(), format!("{label} is required"));
        } else {
            errors.insert(
                field.to_string(),
                format!("{label} must be at least {min} characters"),
            );
        }
    } else if len > max {
        errors.insert(
            field.to_string(),
            format!("{label} must be less than {max} characters"),
        );
    }
}

impl EmployeeForm {
    /// Validates every field and builds the outgoing record. All failures are
    /// reported at once, keyed by field name.
    pub fn to_record(&self) -> Result<EmployeeRecord, BTreeMap<String, String>> {
        let mut errors = BTreeMap::new();

        check_length(&mut errors, "employee_code", "Employee code", &self.employee_code, 1, 50);
        check_length(&mut errors, "employee_name", "Employee name", &self.employee_name, 2, 100);
        check_length(&mut errors, "gender", "Gender", &self.gender, 1, 20);
        check_length(&mut errors, "designation", "Designation", &self.designation, 2, 100);
        check_length(&mut errors, "aadhaar_number", "Aadhaar number", &self.aadhaar_number, 8, 20);
        check_length(&mut errors, "contact_number", "Contact number", &self.contact_number, 5, 30);
        check_length(
            &mut errors,
            "emergency_contact_name",
            "Emergency contact name",
            &self.emergency_contact_name,
            2,
            100,
        );
        check_length(
            &mut errors,
            "emergency_contact_number",
            "Emergency contact number",
            &self.emergency_contact_number,
            5,
            30,
        );

        if self.date_of_birth.trim().is_empty() {
            errors.insert("date_of_birth".to_string(), "Date of birth is required".to_string());
        }
        if self.date_of_joining.trim().is_empty() {
            errors.insert(
                "date_of_joining".to_string(),
                "Date of joining is required".to_string(),
            );
        }

        let uan = self.uan.trim();
        if uan.len() > 20 {
            errors.insert("uan".to_string(), "UAN must be less than 20 characters".to_string());
        }

        if !looks_like_email(self.personal_email_id.trim()) {
            errors.insert(
                "personal_email_id".to_string(),
                "Invalid personal email address".to_string(),
            );
        }
        if !looks_like_email(self.official_email_id.trim()) {
            errors.insert(
                "official_email_id".to_string(),
                "Invalid official email address".to_string(),
            );
        }

        let ctc = self.ctc_at_joining.trim().parse::<f64>().unwrap_or(0.0);
        if ctc <= 0.0 {
            errors.insert(
                "ctc_at_joining".to_string(),
                "CTC must be a positive number".to_string(),
            );
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(EmployeeRecord {
            employee_code: self.employee_code.trim().to_string(),
            employee_name: self.employee_name.trim().to_string(),
            gender: self.gender.trim().to_string(),
            date_of_birth: self.date_of_birth.trim().to_string(),
            date_of_joining: self.date_of_joining.trim().to_string(),
            designation: self.designation.trim().to_string(),
            ctc_at_joining: ctc,
            aadhaar_number: self.aadhaar_number.trim().to_string(),
            uan: (!uan.is_empty()).then(|| uan.to_string()),
            personal_email_id: self.personal_email_id.trim().to_string(),
            official_email_id: self.official_email_id.trim().to_string(),
            contact_number: self.contact_number.trim().to_string(),
            emergency_contact_name: self.emergency_contact_name.trim().to_string(),
            emergency_contact_number: self.emergency_contact_number.trim().to_string(),
        })
    }
}
