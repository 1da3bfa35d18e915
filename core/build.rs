// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

fn main() {
    // sqlx::migrate! embeds the SQL files, so a new migration must rebuild the crate
    println!("cargo:rerun-if-changed=src/localdb/migrations");
}
