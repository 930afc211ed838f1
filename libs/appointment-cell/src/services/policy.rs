// libs/appointment-cell/src/services/policy.rs
//
// Capability checks for appointment actions, centralised so role rules
// live in one place instead of being scattered across handlers.

use shared_models::auth::User;

use crate::models::{Appointment, AppointmentStatus};

/// Who may move an appointment into `new_status`:
/// cancellation belongs to the owning patient (or an admin); clinical
/// transitions (confirm, complete, missed) belong to the appointment's
/// doctor (or an admin). Doctor principals carry their directory id as
/// the token subject.
pub fn can_transition(user: &User, appointment: &Appointment, new_status: &AppointmentStatus) -> bool {
    if user.is_admin() {
        return !matches!(new_status, AppointmentStatus::Scheduled);
    }

    match new_status {
        AppointmentStatus::Cancelled => user.id == appointment.patient_id.to_string(),
        AppointmentStatus::Confirmed
        | AppointmentStatus::Completed
        | AppointmentStatus::Missed => {
            user.is_doctor() && user.id == appointment.doctor_id.to_string()
        }
        AppointmentStatus::Scheduled => false,
    }
}

/// Only the owning patient may rate.
pub fn can_rate(user: &User, appointment: &Appointment) -> bool {
    user.id == appointment.patient_id.to_string()
}

/// Owning patient, the appointment's doctor, or an admin may read.
pub fn can_view(user: &User, appointment: &Appointment) -> bool {
    user.is_admin()
        || user.id == appointment.patient_id.to_string()
        || user.id == appointment.doctor_id.to_string()
}

/// Owning patient or admin may edit (reschedule, notes, payment flag).
pub fn can_update(user: &User, appointment: &Appointment) -> bool {
    user.is_admin() || user.id == appointment.patient_id.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use shared_utils::test_utils::TestUser;
    use uuid::Uuid;

    use crate::models::{PaymentMethod, Reminder};

    fn appointment(patient_id: Uuid, doctor_id: Uuid) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            date: NaiveDate::from_ymd_opt(2099, 1, 10).unwrap(),
            time: "09:00".to_string(),
            duration_minutes: 30,
            specialty: "Cardiology".to_string(),
            reason: None,
            notes: None,
            status: crate::models::AppointmentStatus::Scheduled,
            price: 80.0,
            is_online: false,
            online_link: None,
            payment_method: PaymentMethod::Cash,
            paid: false,
            reminder: Reminder::default(),
            rating: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn owning_patient_can_cancel_but_not_complete() {
        let patient_id = Uuid::new_v4();
        let appointment = appointment(patient_id, Uuid::new_v4());
        let patient = TestUser::with_id(patient_id, "p@example.com", "patient").to_user();

        assert!(can_transition(&patient, &appointment, &AppointmentStatus::Cancelled));
        assert!(!can_transition(&patient, &appointment, &AppointmentStatus::Completed));
        assert!(!can_transition(&patient, &appointment, &AppointmentStatus::Confirmed));
    }

    #[test]
    fn other_patient_cannot_cancel() {
        let appointment = appointment(Uuid::new_v4(), Uuid::new_v4());
        let stranger = TestUser::patient("other@example.com").to_user();

        assert!(!can_transition(&stranger, &appointment, &AppointmentStatus::Cancelled));
    }

    #[test]
    fn own_doctor_can_confirm_complete_miss() {
        let doctor_id = Uuid::new_v4();
        let appointment = appointment(Uuid::new_v4(), doctor_id);
        let doctor = TestUser::with_id(doctor_id, "d@example.com", "doctor").to_user();
        let other_doctor = TestUser::doctor("other@example.com").to_user();

        for target in [
            AppointmentStatus::Confirmed,
            AppointmentStatus::Completed,
            AppointmentStatus::Missed,
        ] {
            assert!(can_transition(&doctor, &appointment, &target));
            assert!(!can_transition(&other_doctor, &appointment, &target));
        }
        assert!(!can_transition(&doctor, &appointment, &AppointmentStatus::Cancelled));
    }

    #[test]
    fn admin_can_do_everything_except_rewind() {
        let appointment = appointment(Uuid::new_v4(), Uuid::new_v4());
        let admin = TestUser::admin("a@example.com").to_user();

        assert!(can_transition(&admin, &appointment, &AppointmentStatus::Cancelled));
        assert!(can_transition(&admin, &appointment, &AppointmentStatus::Completed));
        assert!(!can_transition(&admin, &appointment, &AppointmentStatus::Scheduled));
    }

    #[test]
    fn only_owner_rates() {
        let patient_id = Uuid::new_v4();
        let appointment = appointment(patient_id, Uuid::new_v4());

        let owner = TestUser::with_id(patient_id, "p@example.com", "patient").to_user();
        let admin = TestUser::admin("a@example.com").to_user();

        assert!(can_rate(&owner, &appointment));
        assert!(!can_rate(&admin, &appointment));
    }

    #[test]
    fn view_rights_cover_all_parties() {
        let patient_id = Uuid::new_v4();
        let doctor_id = Uuid::new_v4();
        let appointment = appointment(patient_id, doctor_id);

        assert!(can_view(
            &TestUser::with_id(patient_id, "p@example.com", "patient").to_user(),
            &appointment
        ));
        assert!(can_view(
            &TestUser::with_id(doctor_id, "d@example.com", "doctor").to_user(),
            &appointment
        ));
        assert!(can_view(&TestUser::admin("a@example.com").to_user(), &appointment));
        assert!(!can_view(&TestUser::patient("x@example.com").to_user(), &appointment));
    }
}
