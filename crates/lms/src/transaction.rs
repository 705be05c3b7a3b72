//! 事务处理辅助宏
//!
//! 提供简化的数据库事务处理接口，减少重复的样板代码。
//! 事务体内只能使用闭包提供的 `$txn`，不要再访问连接池。

/// 简化数据库事务处理的宏。
///
/// # 参数
///
/// * `$db` - 数据库连接引用
/// * `$txn` - 事务参数名称
/// * `$body` - 事务体，返回 `Result<T, CoursehubError>` 或 `Result<T, AppError>`
///
/// # 示例
///
/// ```ignore
/// let removed = txn!(&state.db, |txn| {
///     let deleted = course_user_group_users::Entity::delete_many()
///         .filter(course_user_group_users::Column::UserId.eq(user_id))
///         .exec(txn)
///         .await?;
///     Ok::<_, CoursehubError>(deleted.rows_affected)
/// })?;
/// ```
#[macro_export]
macro_rules! txn {
    ($db:expr, |$txn:ident| $body:expr) => {{
        use sea_orm::TransactionTrait;
        $db.transaction(|$txn| Box::pin(async move { $body })).await
    }};
}

/// 带参数克隆的事务宏。
///
/// 当事务闭包需要捕获外部变量时使用，自动克隆参数避免所有权问题。
///
/// # 示例
///
/// ```ignore
/// let set = txn_with!(&state.db, |txn, course_key, modes| {
///     let set = example_certificate_sets::ActiveModel { .. }.insert(txn).await?;
///     for mode in modes.iter() { /* ... */ }
///     Ok::<_, CoursehubError>(set)
/// }, &course_key, &modes)?;
/// ```
#[macro_export]
macro_rules! txn_with {
    ($db:expr, |$txn:ident, $($param:ident),*| $body:expr, $($arg:expr),*) => {{
        use sea_orm::TransactionTrait;
        $(let $param = $arg.clone();)*
        $db.transaction(|$txn| Box::pin(async move { $body })).await
    }};
}
