use super::domain::{Employee, Role};

/// Which requests a role may see in listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Own,
    DirectReports,
    Everyone,
}

impl Role {
    pub const fn visibility(self) -> Visibility {
        match self {
            Self::IndividualContributor => Visibility::Own,
            Self::Supervisor => Visibility::DirectReports,
            Self::Hr | Self::Administrator => Visibility::Everyone,
        }
    }

    /// HR staff and administrators may decide on any request.
    pub const fn decides_any_request(self) -> bool {
        matches!(self, Self::Hr | Self::Administrator)
    }

    /// Whether the role may browse and edit departments, employees, and
    /// ledgers.
    pub const fn manages_directory(self) -> bool {
        matches!(self, Self::Hr | Self::Administrator)
    }

    /// Deleting a department is reserved to administrators.
    pub const fn deletes_departments(self) -> bool {
        matches!(self, Self::Administrator)
    }
}

/// An active actor may decide when their role allows any decision or when they
/// are the requester's direct supervisor.
pub fn can_decide(actor: &Employee, requester: &Employee) -> bool {
    if !actor.active {
        return false;
    }
    actor.role.decides_any_request() || requester.supervisor.as_ref() == Some(&actor.id)
}

/// Whether `actor` may see `subject`'s requests and balances.
pub fn can_view(actor: &Employee, subject: &Employee) -> bool {
    if actor.id == subject.id {
        return true;
    }
    match actor.role.visibility() {
        Visibility::Everyone => true,
        Visibility::DirectReports => subject.supervisor.as_ref() == Some(&actor.id),
        Visibility::Own => false,
    }
}
