use actix_web::{web, HttpRequest, HttpResponse};

use crate::errors::AppError;
use crate::models::department::Department;
use crate::utils::guard;

// Read-only lookup used to populate the selection menus. Departments are
// created and maintained outside this service.
pub async fn get_departments(
    req: HttpRequest,
    pool: web::Data<sqlx::PgPool>,
) -> Result<HttpResponse, actix_web::Error> {
    guard::require_any_role(&req, guard::ADMIN_ROLES)?;

    let departments = sqlx::query_as::<_, Department>(
        "SELECT dept_id, name FROM departments ORDER BY dept_id",
    )
    .fetch_all(&**pool)
    .await
    .map_err(|err| AppError::DatabaseError(err.to_string()))?;

    Ok(HttpResponse::Ok().json(departments))
}
