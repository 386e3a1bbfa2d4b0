use serde::{Deserialize, Serialize};

// Departments are provisioned elsewhere; this service only reads them.
pub const ALLOWED_DEPARTMENTS: &[i64] = &[1, 2, 3];

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug)]
pub struct Department {
    pub dept_id: i64,
    pub name: String,
}

pub fn is_allowed_department(dept_id: i64) -> bool {
    ALLOWED_DEPARTMENTS.contains(&dept_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_set_is_fixed() {
        assert!(is_allowed_department(1));
        assert!(is_allowed_department(2));
        assert!(is_allowed_department(3));
        assert!(!is_allowed_department(0));
        assert!(!is_allowed_department(4));
        assert!(!is_allowed_department(-1));
    }
}
