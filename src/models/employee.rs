use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub gender: String,
    #[serde(serialize_with = "serialize_dob")]
    pub dob: NaiveDate,
    pub dept_id: i64,
    pub photo: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

// Listing/show row with the department name joined in. The join is a left
// join, so the name is null for employees pointing at an unknown department.
#[derive(sqlx::FromRow, Serialize, Debug)]
pub struct EmployeeWithDepartment {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub gender: String,
    #[serde(serialize_with = "serialize_dob")]
    pub dob: NaiveDate,
    pub dept_id: i64,
    pub photo: Option<String>,
    pub department_name: Option<String>,
}

// Validated field values ready to be applied to a record. `photo` is the
// stored filename of a freshly accepted upload; None keeps the current one.
#[derive(Debug, Clone)]
pub struct EmployeeChanges {
    pub name: String,
    pub email: String,
    pub gender: String,
    pub dob: NaiveDate,
    pub dept_id: i64,
    pub photo: Option<String>,
}

impl Employee {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

pub fn apply_update(existing: Employee, changes: EmployeeChanges) -> Employee {
    Employee {
        name: normalize_name(&changes.name),
        email: changes.email,
        gender: changes.gender,
        dob: changes.dob,
        dept_id: changes.dept_id,
        photo: changes.photo.or(existing.photo),
        ..existing
    }
}

// Uppercase the first letter of every whitespace-separated word, leaving the
// remaining characters untouched.
pub fn normalize_name(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    let mut at_word_start = true;
    for c in raw.chars() {
        if at_word_start && c.is_alphabetic() {
            normalized.extend(c.to_uppercase());
        } else {
            normalized.push(c);
        }
        at_word_start = c.is_whitespace();
    }
    normalized
}

fn serialize_dob<S>(dob: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&dob.format("%d-%m-%Y").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_employee() -> Employee {
        Employee {
            id: 7,
            name: "Alice Smith".to_string(),
            email: "alice@example.com".to_string(),
            gender: "Female".to_string(),
            dob: NaiveDate::from_ymd_opt(1990, 3, 5).unwrap(),
            dept_id: 1,
            photo: Some("1700000000.jpg".to_string()),
            deleted_at: None,
        }
    }

    #[test]
    fn normalizes_each_word() {
        assert_eq!(normalize_name("john doe"), "John Doe");
        assert_eq!(normalize_name("anne marie de vries"), "Anne Marie De Vries");
    }

    #[test]
    fn normalization_leaves_inner_characters_alone() {
        assert_eq!(normalize_name("McGREGOR"), "McGREGOR");
        assert_eq!(normalize_name("mary-jane smith"), "Mary-jane Smith");
    }

    #[test]
    fn normalization_handles_unicode_letters() {
        assert_eq!(normalize_name("élodie dupont"), "Élodie Dupont");
    }

    #[test]
    fn dob_renders_day_month_year() {
        let employee = sample_employee();
        let json = serde_json::to_value(&employee).unwrap();
        assert_eq!(json["dob"], "05-03-1990");
    }

    #[test]
    fn active_means_no_deletion_marker() {
        let mut employee = sample_employee();
        assert!(employee.is_active());
        employee.deleted_at = Some(Utc::now());
        assert!(!employee.is_active());
    }

    #[test]
    fn update_without_photo_keeps_existing_file() {
        let existing = sample_employee();
        let changes = EmployeeChanges {
            name: "alice jones".to_string(),
            email: "alice@example.com".to_string(),
            gender: "Female".to_string(),
            dob: NaiveDate::from_ymd_opt(1990, 3, 5).unwrap(),
            dept_id: 2,
            photo: None,
        };

        let updated = apply_update(existing, changes);
        assert_eq!(updated.id, 7);
        assert_eq!(updated.name, "Alice Jones");
        assert_eq!(updated.dept_id, 2);
        assert_eq!(updated.photo.as_deref(), Some("1700000000.jpg"));
        assert!(updated.deleted_at.is_none());
    }

    #[test]
    fn update_with_photo_replaces_filename() {
        let existing = sample_employee();
        let changes = EmployeeChanges {
            name: "alice smith".to_string(),
            email: "new@example.com".to_string(),
            gender: "Female".to_string(),
            dob: NaiveDate::from_ymd_opt(1991, 1, 1).unwrap(),
            dept_id: 1,
            photo: Some("1700000999.png".to_string()),
        };

        let updated = apply_update(existing, changes);
        assert_eq!(updated.photo.as_deref(), Some("1700000999.png"));
        assert_eq!(updated.email, "new@example.com");
    }
}
