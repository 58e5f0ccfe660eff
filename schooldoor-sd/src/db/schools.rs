//! School record persistence

use crate::models::School;
use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use schooldoor_common::{Error, Result};

fn json_to_text<T: serde::Serialize>(value: &Option<T>, what: &str) -> Result<Option<String>> {
    value
        .as_ref()
        .map(|v| serde_json::to_string(v))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to serialize {}: {}", what, e)))
}

fn text_to_map(text: Option<String>, what: &str) -> Result<Option<Map<String, Value>>> {
    text.map(|t| serde_json::from_str(&t))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to deserialize {}: {}", what, e)))
}

fn school_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<School> {
    let school_id: String = row.get("school_id");
    let school_id = Uuid::parse_str(&school_id)
        .map_err(|e| Error::Internal(format!("Failed to parse school_id: {}", e)))?;

    let programs: Option<String> = row.get("programs");
    let programs: Option<Vec<String>> = programs
        .map(|t| serde_json::from_str(&t))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to deserialize programs: {}", e)))?;

    let parse_ts = |column: &str, value: Option<String>| -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        value
            .map(|s| chrono::DateTime::parse_from_rfc3339(&s))
            .transpose()
            .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
            .map(|opt| opt.map(|dt| dt.with_timezone(&chrono::Utc)))
    };

    let created_at = parse_ts("created_at", Some(row.get("created_at")))?
        .ok_or_else(|| Error::Internal("created_at missing".to_string()))?;

    Ok(School {
        school_id,
        name: row.get("name"),
        address: row.get("address"),
        city: row.get("city"),
        state: row.get("state"),
        postal_code: row.get("postal_code"),
        country: row.get("country"),
        phone: row.get("phone"),
        email: row.get("email"),
        website: row.get("website"),
        school_type: row.get("school_type"),
        board: row.get("board"),
        grade_levels: row.get("grade_levels"),
        enrollment: row.get("enrollment"),
        student_teacher_ratio: row.get("student_teacher_ratio"),
        medium_of_instruction: row.get("medium_of_instruction"),
        principal_name: row.get("principal_name"),
        programs,
        facilities: text_to_map(row.get("facilities"), "facilities")?,
        board_exam_results: text_to_map(row.get("board_exam_results"), "board_exam_results")?,
        competitive_exam_results: text_to_map(
            row.get("competitive_exam_results"),
            "competitive_exam_results",
        )?,
        created_at,
        updated_at: parse_ts("updated_at", row.get("updated_at"))?,
        last_synced_at: parse_ts("last_synced_at", row.get("last_synced_at"))?,
    })
}

const SCHOOL_COLUMNS: &str = "school_id, name, address, city, state, postal_code, country, \
     phone, email, website, school_type, board, grade_levels, enrollment, \
     student_teacher_ratio, medium_of_instruction, principal_name, programs, \
     facilities, board_exam_results, competitive_exam_results, created_at, \
     updated_at, last_synced_at";

/// Names of schools already stored for a region (case-insensitive city match)
pub async fn school_names_in_region(pool: &SqlitePool, region: &str) -> Result<Vec<String>> {
    let rows = sqlx::query("SELECT name FROM schools WHERE LOWER(city) = LOWER(?)")
        .bind(region)
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(|row| row.get("name")).collect())
}

/// Find a school by exact (name, city) pair
pub async fn find_by_name_city(
    pool: &SqlitePool,
    name: &str,
    city: &str,
) -> Result<Option<School>> {
    let query = format!(
        "SELECT {} FROM schools WHERE name = ? AND city = ?",
        SCHOOL_COLUMNS
    );
    let row = sqlx::query(&query)
        .bind(name)
        .bind(city)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(school_from_row).transpose()
}

/// Insert a new school record
pub async fn insert_school(pool: &SqlitePool, school: &School) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO schools (
            school_id, name, address, city, state, postal_code, country,
            phone, email, website, school_type, board, grade_levels,
            enrollment, student_teacher_ratio, medium_of_instruction,
            principal_name, programs, facilities, board_exam_results,
            competitive_exam_results, created_at, updated_at, last_synced_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(school.school_id.to_string())
    .bind(&school.name)
    .bind(&school.address)
    .bind(&school.city)
    .bind(&school.state)
    .bind(&school.postal_code)
    .bind(&school.country)
    .bind(&school.phone)
    .bind(&school.email)
    .bind(&school.website)
    .bind(&school.school_type)
    .bind(&school.board)
    .bind(&school.grade_levels)
    .bind(school.enrollment)
    .bind(school.student_teacher_ratio)
    .bind(&school.medium_of_instruction)
    .bind(&school.principal_name)
    .bind(json_to_text(&school.programs, "programs")?)
    .bind(json_to_text(&school.facilities, "facilities")?)
    .bind(json_to_text(&school.board_exam_results, "board_exam_results")?)
    .bind(json_to_text(
        &school.competitive_exam_results,
        "competitive_exam_results",
    )?)
    .bind(school.created_at.to_rfc3339())
    .bind(school.updated_at.map(|dt| dt.to_rfc3339()))
    .bind(school.last_synced_at.map(|dt| dt.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist a merged school record (full-row update by id)
pub async fn update_school(pool: &SqlitePool, school: &School) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE schools SET
            address = ?, city = ?, state = ?, postal_code = ?, country = ?,
            phone = ?, email = ?, website = ?, school_type = ?, board = ?,
            grade_levels = ?, enrollment = ?, student_teacher_ratio = ?,
            medium_of_instruction = ?, principal_name = ?, programs = ?,
            facilities = ?, board_exam_results = ?, competitive_exam_results = ?,
            updated_at = ?, last_synced_at = ?
        WHERE school_id = ?
        "#,
    )
    .bind(&school.address)
    .bind(&school.city)
    .bind(&school.state)
    .bind(&school.postal_code)
    .bind(&school.country)
    .bind(&school.phone)
    .bind(&school.email)
    .bind(&school.website)
    .bind(&school.school_type)
    .bind(&school.board)
    .bind(&school.grade_levels)
    .bind(school.enrollment)
    .bind(school.student_teacher_ratio)
    .bind(&school.medium_of_instruction)
    .bind(&school.principal_name)
    .bind(json_to_text(&school.programs, "programs")?)
    .bind(json_to_text(&school.facilities, "facilities")?)
    .bind(json_to_text(&school.board_exam_results, "board_exam_results")?)
    .bind(json_to_text(
        &school.competitive_exam_results,
        "competitive_exam_results",
    )?)
    .bind(school.updated_at.map(|dt| dt.to_rfc3339()))
    .bind(school.last_synced_at.map(|dt| dt.to_rfc3339()))
    .bind(school.school_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}
