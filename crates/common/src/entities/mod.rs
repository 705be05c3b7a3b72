//! SeaORM 实体定义

pub mod certificate_generation_configurations;
pub mod certificate_generation_course_settings;
pub mod certificate_html_view_configurations;
pub mod certificate_whitelist;
pub mod course_enrollments;
pub mod course_grades;
pub mod course_modes;
pub mod course_user_group_users;
pub mod course_user_groups;
pub mod courses;
pub mod example_certificate_sets;
pub mod example_certificates;
pub mod generated_certificates;
pub mod restricted_courses;
pub mod user_org_tags;
pub mod user_preferences;
pub mod users;
