//! Shared declarations for unit tests.

use crate::entity::{ColumnDecl, ColumnType, EntityDecl, RelationshipDecl};
use crate::registry::{Registry, RegistryBuilder};

pub fn user_decl() -> EntityDecl {
    EntityDecl::new("User")
        .column(ColumnDecl::new("id", ColumnType::Integer).primary_key())
        .column(ColumnDecl::new("name", ColumnType::Text))
        .column(ColumnDecl::new("age", ColumnType::Integer))
        .column(ColumnDecl::new("best_friend_id", ColumnType::Integer).references("User", "id"))
        .relationship(RelationshipDecl::to_one("best_friend", "User", "best_friend_id"))
}

pub fn address_decl() -> EntityDecl {
    EntityDecl::new("Address")
        .column(ColumnDecl::new("id", ColumnType::Integer).primary_key())
        .column(ColumnDecl::new("city", ColumnType::Text).not_null())
        .column(
            ColumnDecl::new("owner_id", ColumnType::Integer)
                .not_null()
                .references("User", "id"),
        )
        .relationship(RelationshipDecl::to_one("owner", "User", "owner_id").backref("addresses"))
}

pub fn registry() -> Registry {
    let mut builder = RegistryBuilder::new();
    builder.expose_decl(user_decl()).expect("expose user");
    builder.expose_decl(address_decl()).expect("expose address");
    builder.build().expect("build registry")
}
