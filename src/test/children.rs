#[cfg(test)]
mod tests {
    use crate::db::{
        create_child, delete_ai_preference, delete_child, get_ai_preference, get_child,
        get_children_for_therapist, save_ai_preference,
    };
    use crate::error::AppError;
    use crate::test::test_db::{TestDb, TestDbBuilder};
    use chrono::NaiveDate;

    async fn caseload() -> TestDb {
        TestDbBuilder::new()
            .therapist("dana@example.com", "Dana", "Reyes")
            .therapist("ravi@example.com", "Ravi", "Patel")
            .child("Mia", "Chen", Some("dana@example.com"))
            .child("Leo", "Adams", Some("dana@example.com"))
            .child("Zoe", "Brown", Some("ravi@example.com"))
            .child("Ivy", "Stone", None)
            .build()
            .await
            .expect("Failed to build test database")
    }

    #[tokio::test]
    async fn test_create_and_get_child() {
        let test_db = caseload().await;
        let therapist_id = test_db.therapist_id("ravi@example.com");
        let dob = NaiveDate::from_ymd_opt(2018, 6, 2);

        let child = create_child(&test_db.pool, " Noah ", "Kim", dob, therapist_id)
            .await
            .expect("Failed to create child");

        assert_eq!(child.first_name, "Noah");
        assert_eq!(child.date_of_birth, dob);
        assert_eq!(child.primary_therapist_id, therapist_id);

        let fetched = get_child(&test_db.pool, child.id).await.unwrap();
        assert_eq!(fetched.last_name, "Kim");

        assert!(matches!(
            get_child(&test_db.pool, 9999).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_child_with_unknown_therapist_is_rejected() {
        let test_db = caseload().await;

        let result = create_child(&test_db.pool, "Noah", "Kim", None, Some(9999)).await;
        assert!(matches!(result, Err(AppError::Validation(_))), "Got {:?}", result);
    }

    #[tokio::test]
    async fn test_children_for_therapist_sorted_by_name() {
        let test_db = caseload().await;
        let dana = test_db.therapist_id("dana@example.com").unwrap();

        let children = get_children_for_therapist(&test_db.pool, dana).await.unwrap();
        let names: Vec<_> = children.iter().map(|c| c.first_name.as_str()).collect();

        assert_eq!(names, vec!["Leo", "Mia"]);
    }

    #[tokio::test]
    async fn test_ai_preference_upsert() {
        let test_db = caseload().await;
        let mia = test_db.child_id("Mia").unwrap();

        assert!(get_ai_preference(&test_db.pool, mia).await.unwrap().is_none());

        let first = save_ai_preference(&test_db.pool, mia, "Keep sentences short")
            .await
            .expect("Save failed");
        assert_eq!(first.child_id, mia);
        assert_eq!(first.ai_instructions, "Keep sentences short");

        test_db.backdate("ai_preferences", "updated_at", "id", first.id).await;
        let before = get_ai_preference(&test_db.pool, mia).await.unwrap().unwrap();

        let second = save_ai_preference(&test_db.pool, mia, "Use visual supports")
            .await
            .expect("Second save failed");

        assert_eq!(second.id, first.id, "Upsert keeps the same row");
        assert_eq!(second.ai_instructions, "Use visual supports");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > before.updated_at);

        let stored = get_ai_preference(&test_db.pool, mia).await.unwrap().unwrap();
        assert_eq!(stored.ai_instructions, "Use visual supports");
    }

    #[tokio::test]
    async fn test_ai_preference_for_unknown_child_is_rejected() {
        let test_db = caseload().await;

        let result = save_ai_preference(&test_db.pool, 9999, "Anything").await;
        assert!(matches!(result, Err(AppError::Validation(_))), "Got {:?}", result);
    }

    #[tokio::test]
    async fn test_delete_ai_preference() {
        let test_db = caseload().await;
        let zoe = test_db.child_id("Zoe").unwrap();

        save_ai_preference(&test_db.pool, zoe, "Prefers dinosaurs").await.unwrap();

        assert!(delete_ai_preference(&test_db.pool, zoe).await.unwrap());
        assert!(!delete_ai_preference(&test_db.pool, zoe).await.unwrap());
        assert!(get_ai_preference(&test_db.pool, zoe).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_child_removes_preference() {
        let test_db = caseload().await;
        let ivy = test_db.child_id("Ivy").unwrap();

        save_ai_preference(&test_db.pool, ivy, "Calm tone").await.unwrap();

        assert!(delete_child(&test_db.pool, ivy).await.unwrap());
        assert!(!delete_child(&test_db.pool, ivy).await.unwrap());
        assert!(get_ai_preference(&test_db.pool, ivy).await.unwrap().is_none());
    }
}
