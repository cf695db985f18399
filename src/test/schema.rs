#[cfg(test)]
mod tests {
    use crate::database::{CURRENT_SCHEMA, migrate_database_declaratively};
    use crate::test::test_db::migrated_pool;
    use sqlx::{Pool, Sqlite};

    async fn insert_user(pool: &Pool<Sqlite>, email: &str, role: &str) -> Result<i64, sqlx::Error> {
        let res = sqlx::query("INSERT INTO users (email, password_hash, role) VALUES (?, 'hash', ?)")
            .bind(email)
            .bind(role)
            .execute(pool)
            .await?;
        Ok(res.last_insert_rowid())
    }

    async fn insert_therapist(pool: &Pool<Sqlite>, user_id: i64, email: &str) -> Result<i64, sqlx::Error> {
        let res = sqlx::query(
            "INSERT INTO therapists (user_id, first_name, last_name, email) VALUES (?, 'Dana', 'Reyes', ?)",
        )
        .bind(user_id)
        .bind(email)
        .execute(pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    async fn count(pool: &Pool<Sqlite>, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .expect("Failed to count rows")
    }

    fn is_constraint_error(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db_err) if db_err.message().contains("constraint"))
    }

    #[tokio::test]
    async fn test_role_outside_allowed_values_is_rejected() {
        let pool = migrated_pool().await.expect("Failed to build database");

        let err = insert_user(&pool, "admin@example.com", "admin")
            .await
            .expect_err("Unknown role should be rejected");
        assert!(is_constraint_error(&err), "Unexpected error: {:?}", err);

        insert_user(&pool, "t@example.com", "therapist")
            .await
            .expect("Therapist role should be accepted");
        insert_user(&pool, "p@example.com", "parent")
            .await
            .expect("Parent role should be accepted");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let pool = migrated_pool().await.expect("Failed to build database");

        insert_user(&pool, "same@example.com", "therapist")
            .await
            .expect("First insert failed");
        let err = insert_user(&pool, "same@example.com", "parent")
            .await
            .expect_err("Duplicate email should be rejected");

        assert!(is_constraint_error(&err), "Unexpected error: {:?}", err);
        assert_eq!(count(&pool, "users").await, 1);
    }

    #[tokio::test]
    async fn test_deleting_user_cascades_to_profiles() {
        let pool = migrated_pool().await.expect("Failed to build database");

        let therapist_user = insert_user(&pool, "t@example.com", "therapist").await.unwrap();
        insert_therapist(&pool, therapist_user, "t@example.com").await.unwrap();

        let parent_user = insert_user(&pool, "p@example.com", "parent").await.unwrap();
        sqlx::query(
            "INSERT INTO parents (user_id, first_name, last_name, email) VALUES (?, 'Sam', 'Lee', 'p@example.com')",
        )
        .bind(parent_user)
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query("DELETE FROM users").execute(&pool).await.unwrap();

        assert_eq!(count(&pool, "therapists").await, 0);
        assert_eq!(count(&pool, "parents").await, 0);
    }

    #[tokio::test]
    async fn test_one_therapist_row_per_user() {
        let pool = migrated_pool().await.expect("Failed to build database");

        let user_id = insert_user(&pool, "t@example.com", "therapist").await.unwrap();
        insert_therapist(&pool, user_id, "t@example.com").await.unwrap();

        let err = insert_therapist(&pool, user_id, "other@example.com")
            .await
            .expect_err("Second therapist row for the same user should be rejected");
        assert!(is_constraint_error(&err), "Unexpected error: {:?}", err);
    }

    #[tokio::test]
    async fn test_note_for_missing_therapist_is_rejected() {
        let pool = migrated_pool().await.expect("Failed to build database");

        let err = sqlx::query(
            "INSERT INTO session_notes (therapist_id, session_date, note_content) VALUES (999, '2024-03-01', 'text')",
        )
        .execute(&pool)
        .await
        .expect_err("Dangling therapist reference should be rejected");

        assert!(is_constraint_error(&err), "Unexpected error: {:?}", err);
    }

    #[tokio::test]
    async fn test_deleting_therapist_cascades_to_notes() {
        let pool = migrated_pool().await.expect("Failed to build database");

        let user_id = insert_user(&pool, "t@example.com", "therapist").await.unwrap();
        let therapist_id = insert_therapist(&pool, user_id, "t@example.com").await.unwrap();

        for day in ["2024-03-01", "2024-03-02"] {
            sqlx::query(
                "INSERT INTO session_notes (therapist_id, session_date, note_content) VALUES (?, ?, 'text')",
            )
            .bind(therapist_id)
            .bind(day)
            .execute(&pool)
            .await
            .unwrap();
        }

        sqlx::query("DELETE FROM therapists WHERE id = ?")
            .bind(therapist_id)
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(count(&pool, "session_notes").await, 0);
    }

    #[tokio::test]
    async fn test_deleting_child_cascades_to_ai_preference() {
        let pool = migrated_pool().await.expect("Failed to build database");

        let child_id = sqlx::query("INSERT INTO children (first_name, last_name) VALUES ('Mia', 'Chen')")
            .execute(&pool)
            .await
            .unwrap()
            .last_insert_rowid();
        sqlx::query("INSERT INTO ai_preferences (child_id, ai_instructions) VALUES (?, 'Use visuals')")
            .bind(child_id)
            .execute(&pool)
            .await
            .unwrap();

        let err = sqlx::query("INSERT INTO ai_preferences (child_id, ai_instructions) VALUES (?, 'Again')")
            .bind(child_id)
            .execute(&pool)
            .await
            .expect_err("Second preference row for the same child should be rejected");
        assert!(is_constraint_error(&err));

        sqlx::query("DELETE FROM children WHERE id = ?")
            .bind(child_id)
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(count(&pool, "ai_preferences").await, 0);
    }

    #[tokio::test]
    async fn test_deleting_therapist_unassigns_children() {
        let pool = migrated_pool().await.expect("Failed to build database");

        let user_id = insert_user(&pool, "t@example.com", "therapist").await.unwrap();
        let therapist_id = insert_therapist(&pool, user_id, "t@example.com").await.unwrap();
        sqlx::query(
            "INSERT INTO children (first_name, last_name, primary_therapist_id) VALUES ('Mia', 'Chen', ?)",
        )
        .bind(therapist_id)
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&pool)
            .await
            .unwrap();

        let primary: Option<i64> = sqlx::query_scalar("SELECT primary_therapist_id FROM children")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(primary, None);
    }

    #[tokio::test]
    async fn test_deleting_user_cascades_to_login_sessions() {
        let pool = migrated_pool().await.expect("Failed to build database");

        let user_id = insert_user(&pool, "p@example.com", "parent").await.unwrap();
        sqlx::query(
            "INSERT INTO user_sessions (user_id, token, expires_at) VALUES (?, 'tok', '2999-01-01 00:00:00')",
        )
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(count(&pool, "user_sessions").await, 0);
    }

    #[tokio::test]
    async fn test_reapplying_schema_is_a_no_op() {
        let pool = migrated_pool().await.expect("Failed to build database");

        insert_user(&pool, "t@example.com", "therapist").await.unwrap();

        let changed = migrate_database_declaratively(pool.clone(), CURRENT_SCHEMA, false)
            .await
            .expect("Re-applying the schema failed");

        assert!(!changed);
        assert_eq!(count(&pool, "users").await, 1);
    }

    #[tokio::test]
    async fn test_defaults_on_new_user() {
        let pool = migrated_pool().await.expect("Failed to build database");
        let user_id = insert_user(&pool, "t@example.com", "therapist").await.unwrap();

        let (is_active, is_verified): (bool, bool) =
            sqlx::query_as("SELECT is_active, is_verified FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_one(&pool)
                .await
                .unwrap();

        assert!(is_active);
        assert!(!is_verified);
    }
}
