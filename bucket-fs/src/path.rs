/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::error;

/// Join `relative` onto `parent` to produce the full object key.
///
/// Empty and `.` segments are dropped so repeated or trailing slashes collapse; a leading `/`
/// on the parent folder is kept. Relative paths may not contain `..` segments since they
/// would address objects outside of the parent folder.
pub(crate) fn resolve(parent: &str, relative: &str) -> Result<String, error::Error> {
    if relative.split('/').any(|segment| segment == "..") {
        return Err(error::invalid_path(format!(
            "path `{relative}` cannot contain `..` segments"
        )));
    }

    let rooted = parent.starts_with('/');
    let key = parent
        .split('/')
        .chain(relative.split('/'))
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/");

    Ok(if rooted { format!("/{key}") } else { key })
}
