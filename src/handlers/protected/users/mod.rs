// handlers/protected/users/mod.rs - /api/users handlers

pub mod delete; // DELETE /api/users/:id
pub mod get; // GET /api/users/:id
pub mod list; // GET /api/users
pub mod picture; // POST /api/users/picture/:id
pub mod roles; // GET /api/users/roles/
pub mod search; // GET /api/users/members/search
pub mod update; // PUT /api/users/:id

pub use delete::user_delete;
pub use get::user_get;
pub use list::users_list;
pub use picture::picture_post;
pub use roles::roles_get;
pub use search::search_get;
pub use update::user_put;
