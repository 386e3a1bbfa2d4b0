use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::NaiveDate;
use futures_util::TryStreamExt;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::{Validate, ValidationError};

use crate::errors::AppError;
use crate::models::department;
use crate::models::employee::{self, Employee, EmployeeChanges, EmployeeWithDepartment};
use crate::utils::validation::{self, FieldErrors};
use crate::utils::{guard, storage};

const PER_PAGE: i64 = 5;

const CREATE_FAILED_MESSAGE: &str = "Something went wrong. Please try again.";
const UPDATE_FAILED_MESSAGE: &str = "An unexpected error occurred. Please try again.";

#[derive(Debug, Default, Clone, Serialize, Validate)]
struct EmployeeForm {
    #[validate(custom = "validate_name")]
    name: String,
    #[validate(custom = "validate_email_field")]
    email: String,
    #[validate(custom = "validate_gender")]
    gender: String,
    #[validate(custom = "validate_dob")]
    dob: String,
    #[validate(custom = "validate_department")]
    dept_id: String,
}

struct PhotoUpload {
    bytes: Vec<u8>,
}

#[derive(Deserialize)]
pub struct EmployeeQueryParams {
    search: Option<String>,
    department: Option<String>,
    page: Option<i64>,
}

pub async fn get_employees(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    query: web::Query<EmployeeQueryParams>,
) -> Result<HttpResponse, actix_web::Error> {
    guard::require_any_role(&req, guard::ADMIN_ROLES)?;

    let page = query.page.unwrap_or(1).max(1);

    let mut count_builder: sqlx::QueryBuilder<'_, sqlx::Postgres> =
        sqlx::QueryBuilder::new("SELECT COUNT(*) FROM employees");
    push_listing_filters(&mut count_builder, &query);
    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(&**pool)
        .await
        .map_err(|err| AppError::DatabaseError(err.to_string()))?;

    let mut query_builder: sqlx::QueryBuilder<'_, sqlx::Postgres> = sqlx::QueryBuilder::new(
        "SELECT employees.*, departments.name AS department_name FROM employees \
         LEFT JOIN departments ON departments.dept_id = employees.dept_id",
    );
    push_listing_filters(&mut query_builder, &query);
    query_builder.push(" ORDER BY employees.id DESC");
    query_builder.push(format!(" LIMIT {} OFFSET {}", PER_PAGE, page_offset(page)));

    let employees = query_builder
        .build_query_as::<EmployeeWithDepartment>()
        .fetch_all(&**pool)
        .await
        .map_err(|err| AppError::DatabaseError(err.to_string()))?;

    let last_page = total_pages(total, PER_PAGE);

    Ok(HttpResponse::Ok().json(json!({
        "employees": employees,
        "total": total,
        "page": page,
        "per_page": PER_PAGE,
        "total_pages": last_page,
        "prev_page_url": if page > 1 { Some(page_url(page - 1, &query)) } else { None },
        "next_page_url": if page < last_page { Some(page_url(page + 1, &query)) } else { None },
    })))
}

pub async fn create_employee(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    payload: Multipart,
) -> Result<HttpResponse, actix_web::Error> {
    guard::require_any_role(&req, guard::ADMIN_ROLES)?;

    let (form, photo) = read_employee_form(payload).await?;

    let mut errors = match form.validate() {
        Ok(()) => FieldErrors::new(),
        Err(validation_errors) => validation::collect_field_errors(&validation_errors),
    };

    if !form.email.is_empty() && email_in_use(&pool, &form.email, None).await? {
        validation::add_field_error(&mut errors, "email", "This email is already in use.");
    }

    let mut accepted_photo = None;
    match &photo {
        None => validation::add_field_error(&mut errors, "photo", "Upload image file for Avatar."),
        Some(upload) => match image_extension(&upload.bytes) {
            Some(extension) => accepted_photo = Some((upload, extension)),
            None => validation::add_field_error(
                &mut errors,
                "photo",
                "Uploaded file must be an image file.",
            ),
        },
    }

    if errors.contains_key("name") {
        validation::add_field_error(&mut errors, "name", "Name must be less then 90 characters.");
    }

    if !errors.is_empty() {
        return Ok(validation_failed(&errors, &form));
    }
    let (upload, extension) = match accepted_photo {
        Some(found) => found,
        None => return Ok(validation_failed(&errors, &form)),
    };

    let dob = parse_dob(&form.dob)
        .ok_or_else(|| AppError::InternalServerError(CREATE_FAILED_MESSAGE.to_string()))?;
    let dept_id = parse_department(&form.dept_id)
        .ok_or_else(|| AppError::InternalServerError(CREATE_FAILED_MESSAGE.to_string()))?;

    let image_name = storage::image_name(extension);
    storage::store_image(&storage::image_dir(), &image_name, &upload.bytes)
        .await
        .map_err(|err| {
            error!("Failed to store employee image: {}", err);
            AppError::InternalServerError(CREATE_FAILED_MESSAGE.to_string())
        })?;

    let name = employee::normalize_name(&form.name);
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO employees (name, email, gender, dob, dept_id, photo) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(&name)
    .bind(&form.email)
    .bind(&form.gender)
    .bind(dob)
    .bind(dept_id)
    .bind(&image_name)
    .fetch_one(&**pool)
    .await
    .map_err(|err| {
        error!("Failed to create employee: {}", err);
        AppError::InternalServerError(CREATE_FAILED_MESSAGE.to_string())
    })?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Employee added successfully.",
        "employee": Employee {
            id,
            name,
            email: form.email.clone(),
            gender: form.gender.clone(),
            dob,
            dept_id,
            photo: Some(image_name),
            deleted_at: None,
        },
    })))
}

pub async fn show_employee(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    id: web::Path<i64>,
) -> Result<HttpResponse, actix_web::Error> {
    guard::require_any_role(&req, guard::ADMIN_ROLES)?;

    // No active filter here: soft-deleted rows stay reachable on this
    // administrative path, and a failed lookup reports the raw store error.
    let found = sqlx::query_as::<_, EmployeeWithDepartment>(
        "SELECT employees.*, departments.name AS department_name FROM employees \
         LEFT JOIN departments ON departments.dept_id = employees.dept_id \
         WHERE employees.id = $1",
    )
    .bind(id.into_inner())
    .fetch_one(&**pool)
    .await
    .map_err(|err| AppError::NotFound(err.to_string()))?;

    Ok(HttpResponse::Ok().json(found))
}

pub async fn edit_employee(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    id: web::Path<i64>,
) -> Result<HttpResponse, actix_web::Error> {
    guard::require_any_role(&req, guard::ADMIN_ROLES)?;

    let found = fetch_active_employee(&pool, id.into_inner()).await?;
    let departments = sqlx::query_as::<_, department::Department>(
        "SELECT dept_id, name FROM departments ORDER BY dept_id",
    )
    .fetch_all(&**pool)
    .await
    .map_err(|err| AppError::DatabaseError(err.to_string()))?;

    Ok(HttpResponse::Ok().json(json!({
        "employee": found,
        "departments": departments,
    })))
}

pub async fn update_employee(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    id: web::Path<i64>,
    payload: Multipart,
) -> Result<HttpResponse, actix_web::Error> {
    guard::require_any_role(&req, guard::ADMIN_ROLES)?;

    let id = id.into_inner();
    let existing = fetch_active_employee(&pool, id).await?;

    let (form, photo) = read_employee_form(payload).await?;

    let mut errors = match form.validate() {
        Ok(()) => FieldErrors::new(),
        Err(validation_errors) => validation::collect_field_errors(&validation_errors),
    };

    if !form.email.is_empty() && email_in_use(&pool, &form.email, Some(id)).await? {
        validation::add_field_error(&mut errors, "email", "This email is already in use.");
    }

    if errors.contains_key("name") {
        validation::add_field_error(&mut errors, "name", "Name must be 90 characters long.");
    }

    if !errors.is_empty() {
        return Ok(validation_failed(&errors, &form));
    }

    // The photo is checked after the field pass, keeping the two-step
    // validation order of the form flow.
    let mut new_photo = None;
    if let Some(upload) = &photo {
        let extension = match image_extension(&upload.bytes) {
            Some(extension) => extension,
            None => {
                let mut photo_errors = FieldErrors::new();
                validation::add_field_error(
                    &mut photo_errors,
                    "photo",
                    "Uploaded file must be an image file.",
                );
                return Ok(validation_failed(&photo_errors, &form));
            }
        };

        if let Some(old) = &existing.photo {
            if let Err(err) = storage::delete_image(&storage::image_dir(), old).await {
                warn!("Failed to remove previous image {}: {}", old, err);
            }
        }

        let image_name = storage::image_name(extension);
        storage::store_image(&storage::image_dir(), &image_name, &upload.bytes)
            .await
            .map_err(|err| {
                error!("Failed to store employee image: {}", err);
                AppError::InternalServerError(UPDATE_FAILED_MESSAGE.to_string())
            })?;
        new_photo = Some(image_name);
    }

    let dob = parse_dob(&form.dob)
        .ok_or_else(|| AppError::InternalServerError(UPDATE_FAILED_MESSAGE.to_string()))?;
    let dept_id = parse_department(&form.dept_id)
        .ok_or_else(|| AppError::InternalServerError(UPDATE_FAILED_MESSAGE.to_string()))?;

    let updated = employee::apply_update(
        existing,
        EmployeeChanges {
            name: form.name.clone(),
            email: form.email.clone(),
            gender: form.gender.clone(),
            dob,
            dept_id,
            photo: new_photo,
        },
    );

    sqlx::query(
        "UPDATE employees SET name = $1, email = $2, gender = $3, dob = $4, dept_id = $5, \
         photo = $6 WHERE id = $7",
    )
    .bind(&updated.name)
    .bind(&updated.email)
    .bind(&updated.gender)
    .bind(updated.dob)
    .bind(updated.dept_id)
    .bind(&updated.photo)
    .bind(updated.id)
    .execute(&**pool)
    .await
    .map_err(|err| {
        error!("Failed to update employee {}: {}", id, err);
        AppError::InternalServerError(UPDATE_FAILED_MESSAGE.to_string())
    })?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee details updated successfully.",
        "employee": updated,
    })))
}

pub async fn delete_employee(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
    id: web::Path<i64>,
) -> Result<HttpResponse, actix_web::Error> {
    guard::require_any_role(&req, guard::ADMIN_ROLES)?;

    let found = fetch_active_employee(&pool, id.into_inner()).await?;

    // The image file goes first; a missing file aborts the destroy with the
    // caught error and the record keeps its deletion marker unset.
    if let Some(photo) = &found.photo {
        storage::delete_image(&storage::image_dir(), photo)
            .await
            .map_err(|err| AppError::StorageError(err.to_string()))?;
    }

    sqlx::query("UPDATE employees SET deleted_at = NOW() WHERE id = $1")
        .bind(found.id)
        .execute(&**pool)
        .await
        .map_err(|err| AppError::DatabaseError(err.to_string()))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee deleted successfully.",
    })))
}

async fn fetch_active_employee(pool: &sqlx::PgPool, id: i64) -> Result<Employee, AppError> {
    sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|err| AppError::DatabaseError(err.to_string()))?
        .ok_or_else(|| AppError::NotFound("Employee not found".to_string()))
}

// Email uniqueness spans soft-deleted rows too, so no deleted_at filter here.
async fn email_in_use(
    pool: &sqlx::PgPool,
    email: &str,
    exclude_id: Option<i64>,
) -> Result<bool, AppError> {
    let mut query_builder: sqlx::QueryBuilder<'_, sqlx::Postgres> =
        sqlx::QueryBuilder::new("SELECT EXISTS(SELECT 1 FROM employees WHERE email = ");
    query_builder.push_bind(email.to_string());
    if let Some(id) = exclude_id {
        query_builder.push(" AND id <> ");
        query_builder.push_bind(id);
    }
    query_builder.push(")");

    query_builder
        .build_query_scalar()
        .fetch_one(pool)
        .await
        .map_err(|err| AppError::DatabaseError(err.to_string()))
}

fn push_listing_filters(
    query_builder: &mut sqlx::QueryBuilder<'_, sqlx::Postgres>,
    query: &EmployeeQueryParams,
) {
    query_builder.push(" WHERE employees.deleted_at IS NULL");

    if let Some(search) = &query.search {
        if !search.is_empty() {
            let pattern = format!("%{}%", search);
            query_builder.push(" AND (employees.name ILIKE ");
            query_builder.push_bind(pattern.clone());
            query_builder.push(" OR employees.email ILIKE ");
            query_builder.push_bind(pattern);
            query_builder.push(")");
        }
    }

    if let Some(dept) = &query.department {
        if !dept.is_empty() {
            // Values matching no known id just restrict the result to nothing
            query_builder.push(" AND employees.dept_id = ");
            query_builder.push_bind(dept.parse::<i64>().unwrap_or(-1));
        }
    }
}

async fn read_employee_form(
    mut payload: Multipart,
) -> Result<(EmployeeForm, Option<PhotoUpload>), actix_web::Error> {
    let mut form = EmployeeForm::default();
    let mut photo = None;

    while let Some(mut field) = payload.try_next().await? {
        let field_name = field.name().to_string();
        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            data.extend_from_slice(&chunk);
        }

        match field_name.as_str() {
            "name" => form.name = text_value(data),
            "email" => form.email = text_value(data),
            "gender" => form.gender = text_value(data),
            "dob" => form.dob = text_value(data),
            "dept_id" => form.dept_id = text_value(data),
            "photo" => {
                if !data.is_empty() {
                    photo = Some(PhotoUpload { bytes: data });
                }
            }
            _ => {}
        }
    }

    Ok((form, photo))
}

fn text_value(data: Vec<u8>) -> String {
    String::from_utf8_lossy(&data).trim().to_string()
}

fn validation_failed(errors: &FieldErrors, form: &EmployeeForm) -> HttpResponse {
    HttpResponse::UnprocessableEntity().json(json!({
        "errors": errors,
        "input": form,
    }))
}

fn image_extension(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes)
        .filter(|kind| kind.mime_type().starts_with("image/"))
        .map(|kind| kind.extension())
}

fn page_offset(page: i64) -> i64 {
    (page.max(1) - 1) * PER_PAGE
}

fn total_pages(total: i64, per_page: i64) -> i64 {
    if total <= 0 {
        1
    } else {
        (total + per_page - 1) / per_page
    }
}

// Pagination links keep the active search and department filters.
fn page_url(page: i64, query: &EmployeeQueryParams) -> String {
    let mut url = format!("/v1/employee?page={}", page);
    if let Some(search) = &query.search {
        if !search.is_empty() {
            url.push_str(&format!("&search={}", search));
        }
    }
    if let Some(department) = &query.department {
        if !department.is_empty() {
            url.push_str(&format!("&department={}", department));
        }
    }
    url
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(field_error("required", "Name is required."));
    }
    if !name
        .chars()
        .all(|c| c.is_alphabetic() || c.is_whitespace() || c == '-')
    {
        return Err(field_error("regex", "Name must be containing characters."));
    }
    Ok(())
}

fn validate_email_field(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(field_error("required", "Email is required."));
    }
    if !validator::validate_email(email) {
        return Err(field_error("email", "Enter valid email address."));
    }
    Ok(())
}

fn validate_gender(gender: &str) -> Result<(), ValidationError> {
    if gender.is_empty() {
        return Err(field_error("required", "Gender is required."));
    }
    Ok(())
}

fn validate_dob(dob: &str) -> Result<(), ValidationError> {
    if dob.is_empty() {
        return Err(field_error("required", "Date is required."));
    }
    if parse_dob(dob).is_none() {
        return Err(field_error("date", "Date must be in dd/mm/yyyy format."));
    }
    Ok(())
}

fn validate_department(dept_id: &str) -> Result<(), ValidationError> {
    if dept_id.is_empty() {
        return Err(field_error("required", "Department is required."));
    }
    match parse_department(dept_id) {
        Some(_) => Ok(()),
        None => Err(field_error("in", "Select at least one department.")),
    }
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

fn parse_dob(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .ok()
}

fn parse_department(value: &str) -> Option<i64> {
    value
        .parse::<i64>()
        .ok()
        .filter(|id| department::is_allowed_department(*id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::collect_field_errors;

    fn valid_form() -> EmployeeForm {
        EmployeeForm {
            name: "alice smith".to_string(),
            email: "alice@example.com".to_string(),
            gender: "Female".to_string(),
            dob: "05/03/1990".to_string(),
            dept_id: "2".to_string(),
        }
    }

    #[test]
    fn valid_form_passes() {
        assert!(valid_form().validate().is_ok());
    }

    #[test]
    fn empty_form_reports_every_field() {
        let errors = collect_field_errors(&EmployeeForm::default().validate().unwrap_err());

        assert_eq!(errors.len(), 5);
        assert_eq!(errors["name"], vec!["Name is required."]);
        assert_eq!(errors["email"], vec!["Email is required."]);
        assert_eq!(errors["gender"], vec!["Gender is required."]);
        assert_eq!(errors["dob"], vec!["Date is required."]);
        assert_eq!(errors["dept_id"], vec!["Department is required."]);
    }

    #[test]
    fn name_allows_letters_spaces_and_hyphens() {
        assert!(validate_name("Anne-Marie de Vries").is_ok());
        assert!(validate_name("José García").is_ok());
    }

    #[test]
    fn name_rejects_apostrophes_and_digits() {
        // The apostrophe is outside the allowed character class
        assert!(validate_name("O'Brien").is_err());
        assert!(validate_name("Agent 47").is_err());
        assert!(validate_name("a@b").is_err());
    }

    #[test]
    fn email_format_is_checked() {
        assert!(validate_email_field("alice@example.com").is_ok());

        let error = validate_email_field("not-an-email").unwrap_err();
        assert_eq!(error.message.unwrap(), "Enter valid email address.");
    }

    #[test]
    fn dob_accepts_both_supported_formats() {
        assert_eq!(parse_dob("05/03/1990"), NaiveDate::from_ymd_opt(1990, 3, 5));
        assert_eq!(parse_dob("1990-03-05"), NaiveDate::from_ymd_opt(1990, 3, 5));
        assert_eq!(parse_dob("yesterday"), None);
        assert_eq!(parse_dob("31/02/1990"), None);
    }

    #[test]
    fn dob_failure_reports_expected_format() {
        let error = validate_dob("03-05-1990x").unwrap_err();
        assert_eq!(error.message.unwrap(), "Date must be in dd/mm/yyyy format.");
    }

    #[test]
    fn department_must_be_in_allowed_set() {
        assert!(validate_department("1").is_ok());
        assert!(validate_department("3").is_ok());

        let error = validate_department("7").unwrap_err();
        assert_eq!(error.message.unwrap(), "Select at least one department.");
        assert!(validate_department("abc").is_err());
    }

    #[test]
    fn image_sniffing_accepts_images_only() {
        let png = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";
        let jpeg = b"\xff\xd8\xff\xe0\x00\x10JFIF";
        assert_eq!(image_extension(png), Some("png"));
        assert_eq!(image_extension(jpeg), Some("jpg"));
        assert_eq!(image_extension(b"plain text, not an image"), None);
        assert_eq!(image_extension(b""), None);
    }

    #[test]
    fn twelve_matches_make_three_pages() {
        assert_eq!(total_pages(12, PER_PAGE), 3);
        assert_eq!(total_pages(10, PER_PAGE), 2);
        assert_eq!(total_pages(5, PER_PAGE), 1);
        assert_eq!(total_pages(0, PER_PAGE), 1);
    }

    #[test]
    fn offsets_step_by_page_size() {
        assert_eq!(page_offset(1), 0);
        assert_eq!(page_offset(2), 5);
        assert_eq!(page_offset(3), 10);
        assert_eq!(page_offset(0), 0);
    }

    #[test]
    fn page_links_preserve_filters() {
        let query = EmployeeQueryParams {
            search: Some("alice".to_string()),
            department: Some("2".to_string()),
            page: Some(1),
        };
        assert_eq!(
            page_url(2, &query),
            "/v1/employee?page=2&search=alice&department=2"
        );
    }

    #[test]
    fn page_links_drop_absent_filters() {
        let query = EmployeeQueryParams {
            search: None,
            department: Some(String::new()),
            page: None,
        };
        assert_eq!(page_url(3, &query), "/v1/employee?page=3");
    }
}
